use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::debug;

use crate::{
    buffer::{BufferPool, PAGE_SIZE},
    error::PocketError,
    io::{Encodeable, PocketFile},
    storage::{
        page::{empty_page_data, Page},
        page_id::PageId,
        tuple::{RecordId, Schema, Tuple},
    },
    transaction::{lock_manager::Permission, transaction_id::TransactionId},
    types::{Pod, PocketResult, ResultPod},
    utils::HandyRwLock,
};

/// The disk-side collaborator of the buffer pool. A table's file knows
/// how to move whole pages between disk and memory and how to place or
/// remove a tuple; all page access goes through the pool so that locks
/// and cache residency stay uniform.
pub trait DbFile: Send + Sync {
    fn get_id(&self) -> i32;

    fn read_page(&self, pid: &PageId) -> Result<Page, PocketError>;

    fn write_page(&self, page: &Page) -> PocketResult;

    /// Place the tuple somewhere in the file, growing it if every page
    /// is full. Returns the pages dirtied by the operation; the caller
    /// (the buffer pool) marks them dirty.
    fn insert_tuple(
        &self,
        tid: &TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<Page>>, PocketError>;

    /// Remove the tuple named by its record id. Returns the dirtied page.
    fn delete_tuple(
        &self,
        tid: &TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> ResultPod<Page>;

    fn num_pages(&self) -> usize;
}

pub struct HeapFile {
    id: i32,
    schema: Schema,
    file: Mutex<PocketFile>,
    path: PathBuf,
}

impl HeapFile {
    pub fn new<P: AsRef<Path>>(path: P, id: i32, schema: Schema) -> Result<Self, PocketError> {
        let file = PocketFile::new(&path)?;
        Ok(Self {
            id,
            schema,
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn get_schema(&self) -> Schema {
        self.schema
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// Grow the file by one zeroed page and return its id.
    fn append_empty_page(&self) -> Result<PageId, PocketError> {
        let mut file = self.file.lock().unwrap();
        let page_index = (file.get_size()? / PAGE_SIZE as u64) as i32;
        file.seek(SeekFrom::End(0))?;
        file.write_bytes(&empty_page_data())?;
        file.flush()?;

        debug!("heap file grown, table: {}, pages: {}", self.id, page_index + 1);
        Ok(PageId::new(self.id, page_index))
    }

    /// Read every live tuple of the table through the buffer pool, page
    /// order then slot order.
    pub fn scan_tuples(
        &self,
        tid: &TransactionId,
        pool: &BufferPool,
    ) -> Result<Vec<Tuple>, PocketError> {
        let mut tuples = Vec::new();
        for page_index in 0..self.num_pages() {
            let pid = PageId::new(self.id, page_index as i32);
            let page_pod = pool.get_page(tid, &pid, Permission::ReadOnly)?;
            let page = page_pod.rl();
            for slot in page.used_slots() {
                let row = page.read_row(slot)?;
                let mut tuple = Tuple::from_bytes(&row, &self.schema)?;
                tuple.set_record_id(RecordId::new(pid, slot));
                tuples.push(tuple);
            }
        }
        Ok(tuples)
    }
}

impl DbFile for HeapFile {
    fn get_id(&self) -> i32 {
        self.id
    }

    fn read_page(&self, pid: &PageId) -> Result<Page, PocketError> {
        let mut file = self.file.lock().unwrap();
        let offset = pid.page_index as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > file.get_size()? {
            return Err(PocketError::Db(format!("page {} is out of range", pid)));
        }

        file.seek(SeekFrom::Start(offset))?;
        let buf = file.read_page(PAGE_SIZE)?;
        Ok(Page::new(*pid, buf, self.schema.get_row_size()))
    }

    fn write_page(&self, page: &Page) -> PocketResult {
        let mut file = self.file.lock().unwrap();
        let offset = page.get_pid().page_index as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_bytes(page.get_page_data())?;
        file.flush()?;
        Ok(())
    }

    fn insert_tuple(
        &self,
        tid: &TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<Page>>, PocketError> {
        let row = tuple.encode();

        for page_index in 0..self.num_pages() {
            let pid = PageId::new(self.id, page_index as i32);
            let page_pod = pool.get_page(tid, &pid, Permission::ReadWrite)?;

            let mut page = page_pod.wl();
            if page.empty_slot().is_some() {
                let slot = page.insert_row(&row)?;
                tuple.set_record_id(RecordId::new(pid, slot));
                drop(page);
                return Ok(vec![page_pod]);
            }

            // The page is full. Give the latch back unless this
            // transaction already modified it.
            let untouched = !page.is_dirty();
            drop(page);
            if untouched {
                pool.release_page(tid, &pid);
            }
        }

        let pid = self.append_empty_page()?;
        let page_pod = pool.get_page(tid, &pid, Permission::ReadWrite)?;
        let slot = page_pod.wl().insert_row(&row)?;
        tuple.set_record_id(RecordId::new(pid, slot));
        Ok(vec![page_pod])
    }

    fn delete_tuple(
        &self,
        tid: &TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> ResultPod<Page> {
        let rid = tuple
            .get_record_id()
            .ok_or_else(|| PocketError::new("tuple has no record id"))?;
        if rid.pid.table_id != self.id {
            return Err(PocketError::new("record id points at another table"));
        }

        let page_pod = pool.get_page(tid, &rid.pid, Permission::ReadWrite)?;
        page_pod.wl().delete_row(rid.slot)?;
        Ok(page_pod)
    }

    fn num_pages(&self) -> usize {
        let file = self.file.lock().unwrap();
        (file.get_size().unwrap_or(0) / PAGE_SIZE as u64) as usize
    }
}
