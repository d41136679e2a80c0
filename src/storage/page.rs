use bit_vec::BitVec;

use crate::{
    buffer::PAGE_SIZE, error::PocketError, storage::page_id::PageId,
    transaction::transaction_id::TransactionId,
};

/// A page as the buffer pool sees it: a fixed-size byte image plus the
/// transaction that dirtied it (if any) and the image the page had when
/// the current round of modifications started. The before image is what
/// goes into the write-ahead log when the page is flushed.
///
/// The byte layout is a heap page: a slot-occupancy bitmap header
/// followed by fixed-size rows.
pub struct Page {
    pid: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirtier: Option<TransactionId>,

    /// width of a row in bytes, fixed per table
    row_size: usize,
}

pub fn empty_page_data() -> Vec<u8> {
    vec![0; PAGE_SIZE]
}

impl Page {
    pub fn new(pid: PageId, data: Vec<u8>, row_size: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        let before_image = data.clone();
        Self {
            pid,
            data,
            before_image,
            dirtier: None,
            row_size,
        }
    }

    pub fn get_pid(&self) -> PageId {
        self.pid
    }

    pub fn get_page_data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Advance the before image to the current content. Called after a
    /// commit flushed the page, so the next transaction's log record
    /// starts from the committed state.
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone();
    }

    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    pub fn get_dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Number of row slots on the page. One extra bit per row pays for
    /// the occupancy bitmap.
    pub fn slot_count(&self) -> usize {
        (PAGE_SIZE * 8) / (self.row_size * 8 + 1)
    }

    fn header_size(&self) -> usize {
        (self.slot_count() + 7) / 8
    }

    fn header(&self) -> BitVec {
        BitVec::from_bytes(&self.data[..self.header_size()])
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        let mut header = self.header();
        header.set(slot, used);
        let header_size = self.header_size();
        self.data[..header_size].copy_from_slice(&header.to_bytes());
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header().get(slot).unwrap_or(false)
    }

    pub fn empty_slot(&self) -> Option<usize> {
        let header = self.header();
        (0..self.slot_count()).find(|&i| !header.get(i).unwrap_or(false))
    }

    pub fn used_slots(&self) -> Vec<usize> {
        let header = self.header();
        (0..self.slot_count())
            .filter(|&i| header.get(i).unwrap_or(false))
            .collect()
    }

    fn row_offset(&self, slot: usize) -> usize {
        self.header_size() + slot * self.row_size
    }

    /// Place a row into the first empty slot and return the slot index.
    pub fn insert_row(&mut self, row: &[u8]) -> Result<usize, PocketError> {
        if row.len() != self.row_size {
            return Err(PocketError::new("row size does not match the page layout"));
        }
        let slot = match self.empty_slot() {
            Some(slot) => slot,
            None => return Err(PocketError::new("page is full")),
        };

        let offset = self.row_offset(slot);
        self.data[offset..offset + self.row_size].copy_from_slice(row);
        self.set_slot(slot, true);
        Ok(slot)
    }

    pub fn delete_row(&mut self, slot: usize) -> Result<(), PocketError> {
        if slot >= self.slot_count() || !self.is_slot_used(slot) {
            return Err(PocketError::new("slot is not in use"));
        }

        let offset = self.row_offset(slot);
        for b in &mut self.data[offset..offset + self.row_size] {
            *b = 0;
        }
        self.set_slot(slot, false);
        Ok(())
    }

    pub fn read_row(&self, slot: usize) -> Result<Vec<u8>, PocketError> {
        if slot >= self.slot_count() || !self.is_slot_used(slot) {
            return Err(PocketError::new("slot is not in use"));
        }

        let offset = self.row_offset(slot);
        Ok(self.data[offset..offset + self.row_size].to_vec())
    }
}
