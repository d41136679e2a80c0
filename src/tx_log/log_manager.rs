use std::{collections::HashMap, io::SeekFrom, path::Path};

use log::debug;

use crate::{
    buffer::PAGE_SIZE,
    error::PocketError,
    io::{Encodeable, PocketFile, PocketWriter},
    storage::page_id::PageId,
    transaction::transaction_id::TransactionId,
    types::PocketResult,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum RecordType {
    Start,
    Update,
    Commit,
    Abort,
}

impl RecordType {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RecordType::Start,
            1 => RecordType::Update,
            2 => RecordType::Commit,
            3 => RecordType::Abort,
            _ => panic!("invalid record type: {}", value),
        }
    }
}

impl Encodeable for RecordType {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// The write-ahead log. An UPDATE record carries the full before and
/// after image of the page; forcing the log before the page itself is
/// written is the buffer pool's duty, `force` is the durability point.
pub struct LogManager {
    file: PocketFile,

    /// Byte position of the START record of every transaction that has
    /// logged anything and not yet finished.
    tx_start_position: HashMap<TransactionId, u64>,

    /// The absolute position of the file descriptor cursor.
    current_offset: u64,

    total_records: usize,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, PocketError> {
        let file = PocketFile::new(file_path)?;
        let current_offset = file.get_size()?;
        Ok(Self {
            file,
            tx_start_position: HashMap::new(),
            current_offset,
            total_records: 0,
        })
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    /// # Format
    ///
    /// - 1 byte: record type
    /// - 8 bytes: transaction id
    pub fn log_start(&mut self, tid: &TransactionId) -> PocketResult {
        if self.tx_start_position.contains_key(tid) {
            return Ok(());
        }

        let start_position = self.current_offset;
        let mut writer = PocketWriter::new();
        writer.write(&RecordType::Start);
        writer.write(tid);
        self.append(&writer)?;

        self.tx_start_position.insert(*tid, start_position);
        Ok(())
    }

    /// # Format
    ///
    /// - 1 byte: record type
    /// - 8 bytes: transaction id
    /// - 8 bytes: page id
    /// - PAGE_SIZE bytes: before image
    /// - PAGE_SIZE bytes: after image
    ///
    /// The record is appended but not forced; call `force` before the
    /// page itself goes to disk.
    pub fn log_write(
        &mut self,
        tid: &TransactionId,
        pid: &PageId,
        before_image: &[u8],
        after_image: &[u8],
    ) -> PocketResult {
        debug_assert_eq!(before_image.len(), PAGE_SIZE);
        debug_assert_eq!(after_image.len(), PAGE_SIZE);

        self.log_start(tid)?;

        let mut writer = PocketWriter::new();
        writer.write(&RecordType::Update);
        writer.write(tid);
        writer.write(pid);
        writer.write_bytes(before_image);
        writer.write_bytes(after_image);
        self.append(&writer)?;

        debug!(
            "update record, tid: {}, pid: {}, before: {}, after: {}",
            tid,
            pid,
            image_digest(before_image),
            image_digest(after_image),
        );
        Ok(())
    }

    pub fn log_commit(&mut self, tid: &TransactionId) -> PocketResult {
        if self.tx_start_position.remove(tid).is_none() {
            // the transaction never logged anything
            return Ok(());
        }

        let mut writer = PocketWriter::new();
        writer.write(&RecordType::Commit);
        writer.write(tid);
        self.append(&writer)?;
        self.force()
    }

    pub fn log_abort(&mut self, tid: &TransactionId) -> PocketResult {
        if self.tx_start_position.remove(tid).is_none() {
            return Ok(());
        }

        let mut writer = PocketWriter::new();
        writer.write(&RecordType::Abort);
        writer.write(tid);
        self.append(&writer)?;
        self.force()
    }

    /// Push every appended record to stable storage.
    pub fn force(&mut self) -> PocketResult {
        self.file.sync()
    }

    fn append(&mut self, writer: &PocketWriter) -> PocketResult {
        self.file.seek(SeekFrom::Start(self.current_offset))?;
        self.file.write_bytes(&writer.to_bytes())?;
        self.current_offset += writer.size() as u64;
        self.total_records += 1;
        Ok(())
    }

    /// Truncate the log and forget all in-memory positions.
    pub fn reset(&mut self) -> PocketResult {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.tx_start_position.clear();
        self.current_offset = 0;
        self.total_records = 0;
        Ok(())
    }

    /// Walk the log from the beginning and print one debug line per
    /// record. Page images are shown as short hex digests.
    pub fn show_log_contents(&mut self) -> PocketResult {
        let end = self.current_offset;
        self.file.seek(SeekFrom::Start(0))?;

        let mut offset: u64 = 0;
        while offset < end {
            let record_type = RecordType::from_u8(self.file.read::<u8>()?);
            let tid = self.file.read::<u64>()?;
            offset += 9;

            match record_type {
                RecordType::Update => {
                    let pid: PageId = self.file.read()?;
                    let before = self.file.read_page(PAGE_SIZE)?;
                    let after = self.file.read_page(PAGE_SIZE)?;
                    offset += 8 + 2 * PAGE_SIZE as u64;
                    debug!(
                        "{:>6} UPDATE tx_{} {} {} -> {}",
                        offset,
                        tid,
                        pid,
                        image_digest(&before),
                        image_digest(&after),
                    );
                }
                _ => {
                    debug!("{:>6} {:?} tx_{}", offset, record_type, tid);
                }
            }
        }

        self.file.seek(SeekFrom::Start(self.current_offset))?;
        Ok(())
    }
}

fn image_digest(image: &[u8]) -> String {
    let len = image.len().min(8);
    hex::encode(&image[..len])
}
