use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
};

use crate::{error::PocketError, types::PocketResult};

/// A thin wrapper around `std::fs::File` with the encode/decode traits
/// below wired in. Callers are expected to hold their own mutex around
/// it; the wrapper itself is not synchronized.
pub struct PocketFile {
    file: File,
}

impl PocketFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, PocketError> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self { file })
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> PocketResult {
        self.file.write_all(buf)?;
        Ok(())
    }

    pub fn read<T: Decodeable>(&mut self) -> Result<T, PocketError> {
        Ok(T::decode_from(&mut self.file))
    }

    pub fn read_page(&mut self, page_size: usize) -> Result<Vec<u8>, PocketError> {
        let mut buf: Vec<u8> = vec![0; page_size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn get_size(&self) -> Result<u64, PocketError> {
        let metadata = self.file.metadata()?;
        Ok(metadata.len())
    }

    pub fn set_len(&self, len: u64) -> PocketResult {
        self.file.set_len(len)?;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, PocketError> {
        Ok(self.file.seek(pos)?)
    }

    pub fn flush(&mut self) -> PocketResult {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and fsync. This is the durability point for the write-ahead
    /// log: a record only counts as forced after this returns.
    pub fn sync(&mut self) -> PocketResult {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|e| panic!("io error, expect {} bytes: {}", bytes_count, e));
    buffer
}

/// An append-only byte buffer used to assemble log records before they
/// hit the file in a single write.
pub struct PocketWriter {
    buf: Vec<u8>,
}

impl PocketWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.encode().as_slice());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for PocketWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

/// # Format
///
/// - 1 byte (0 for false, 1 for true)
impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, usize);
