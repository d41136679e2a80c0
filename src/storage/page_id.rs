use std::{fmt, io::Read};

use crate::io::{Decodeable, Encodeable};

/// PageId identifies a unique page of a table, and is the key of every
/// cache and lock map in the crate.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: i32,

    /// position of the page in the table file, start from 0
    pub page_index: i32,
}

impl PageId {
    pub fn new(table_id: i32, page_index: i32) -> Self {
        Self {
            table_id,
            page_index,
        }
    }

    pub fn get_table_id(&self) -> i32 {
        self.table_id
    }

    pub fn get_short_repr(&self) -> String {
        format!("{}_{}", self.table_id, self.page_index)
    }
}

/// # Format
///
/// - 4 bytes: table id
/// - 4 bytes: page index
impl Encodeable for PageId {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.table_id.encode());
        buf.extend_from_slice(&self.page_index.encode());
        buf
    }
}

impl Decodeable for PageId {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let table_id = i32::decode_from(reader);
        let page_index = i32::decode_from(reader);
        Self {
            table_id,
            page_index,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.table_id, self.page_index)
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_round_trip() {
        let pid = PageId::new(42, 7);
        let bytes = pid.encode();
        assert_eq!(bytes.len(), 8);

        let mut reader = Cursor::new(bytes);
        let decoded = PageId::decode_from(&mut reader);
        assert_eq!(pid, decoded);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(PageId::new(1, 2), PageId::new(1, 2));
        assert_ne!(PageId::new(1, 2), PageId::new(2, 1));
    }
}
