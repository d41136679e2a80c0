use std::{fmt, io::Read, mem::size_of};

use crate::{
    error::PocketError,
    io::{Decodeable, Encodeable},
    storage::page_id::PageId,
};

/// All columns are i32 for now. The schema only has to answer one
/// question for the buffer layer: how wide is a row.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: usize,
}

impl Schema {
    pub fn new(columns: usize) -> Self {
        Self { columns }
    }

    pub fn get_columns(&self) -> usize {
        self.columns
    }

    pub fn get_row_size(&self) -> usize {
        self.columns * size_of::<i32>()
    }
}

pub fn int_schema(columns: usize) -> Schema {
    Schema::new(columns)
}

/// The slot a tuple occupies, assigned when the tuple lands on a page.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(pid: PageId, slot: usize) -> Self {
        Self { pid, slot }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Tuple {
    cells: Vec<i32>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(cells: Vec<i32>) -> Self {
        Self {
            cells,
            record_id: None,
        }
    }

    pub fn get_cell(&self, i: usize) -> i32 {
        self.cells[i]
    }

    pub fn get_cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn equal_cells(&self, cells: &[i32]) -> bool {
        self.cells.as_slice() == cells
    }

    pub fn get_record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.record_id = Some(rid);
    }

    pub fn from_bytes(bytes: &[u8], schema: &Schema) -> Result<Self, PocketError> {
        if bytes.len() != schema.get_row_size() {
            return Err(PocketError::new("row size does not match schema"));
        }

        let mut reader = bytes;
        let cells = (0..schema.get_columns())
            .map(|_| i32::decode_from(&mut reader))
            .collect();
        Ok(Self::new(cells))
    }

    pub fn read_from<R: Read>(reader: &mut R, schema: &Schema) -> Self {
        let cells = (0..schema.get_columns())
            .map(|_| i32::decode_from(reader))
            .collect();
        Self::new(cells)
    }
}

/// # Format
///
/// - 4 bytes per cell, little endian, in column order
impl Encodeable for Tuple {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.cells.len() * size_of::<i32>());
        for cell in &self.cells {
            buf.extend_from_slice(&cell.encode());
        }
        buf
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.cells)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trip() {
        let schema = int_schema(3);
        let tuple = Tuple::new(vec![1, -2, 300]);
        let bytes = tuple.encode();
        assert_eq!(bytes.len(), schema.get_row_size());

        let decoded = Tuple::from_bytes(&bytes, &schema).unwrap();
        assert!(decoded.equal_cells(&[1, -2, 300]));
    }
}
