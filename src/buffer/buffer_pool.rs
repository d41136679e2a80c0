use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, RwLock},
};

use log::debug;

use crate::{
    common::catalog::Catalog,
    error::PocketError,
    storage::{page::Page, page_id::PageId, tuple::Tuple},
    transaction::{
        lock_manager::{LockManager, Permission},
        transaction_id::TransactionId,
    },
    tx_log::log_manager::LogManager,
    types::{Pod, PocketResult, ResultPod},
    utils::HandyRwLock,
};

pub const PAGE_SIZE: usize = 4096;
pub const DEFAULT_PAGES: usize = 50;

/// Everything the pool mutates lives behind one mutex: the page map,
/// the recency queue, and the flushed-pages index the recovery path
/// reads.
struct PoolState {
    pages: HashMap<PageId, Pod<Page>>,

    /// least recently used at the front; victim scan order
    recency: VecDeque<PageId>,

    /// pages flushed to disk per transaction, so recovery knows which
    /// on-disk pages reflect which transactions
    flushed_by_tx: HashMap<TransactionId, HashSet<PageId>>,
}

/// A bounded page cache mediating every page read and write.
///
/// Dirty pages are never evicted and never written outside the flush
/// protocol, so an abort can always recover by re-reading the on-disk
/// image (NO STEAL). A flush appends and forces the page's log record
/// before the page itself is written (write-ahead logging).
pub struct BufferPool {
    state: Mutex<PoolState>,
    catalog: Arc<Catalog>,
    log_manager: Pod<LogManager>,
    lock_manager: Arc<LockManager>,
    max_pages: usize,
}

impl BufferPool {
    pub fn new(
        catalog: Arc<Catalog>,
        log_manager: Pod<LogManager>,
        lock_manager: Arc<LockManager>,
        max_pages: usize,
    ) -> Self {
        Self {
            state: Mutex::new(PoolState {
                pages: HashMap::new(),
                recency: VecDeque::new(),
                flushed_by_tx: HashMap::new(),
            }),
            catalog,
            log_manager,
            lock_manager,
            max_pages,
        }
    }

    /// Retrieve the specified page with the associated permission,
    /// blocking in the lock manager until the lock is granted or the
    /// transaction is aborted.
    ///
    /// A cached page is returned as is. Otherwise the page is loaded
    /// through the owning table's file, evicting the least recently
    /// used clean page first when the pool is at capacity. Fails when
    /// every cached page is dirty.
    pub fn get_page(
        &self,
        tid: &TransactionId,
        pid: &PageId,
        perm: Permission,
    ) -> ResultPod<Page> {
        self.lock_manager.request_lock(tid, pid, perm)?;

        let mut state = self.state.lock().unwrap();
        if let Some(page_pod) = state.pages.get(pid) {
            let page_pod = Arc::clone(page_pod);
            Self::touch(&mut state, pid);
            return Ok(page_pod);
        }

        if state.pages.len() >= self.max_pages {
            self.evict(&mut state)?;
        }

        let file = self.catalog.get_db_file(pid.table_id)?;
        let page = file.read_page(pid)?;
        debug!("page loaded, pid: {}", pid);

        let page_pod = Arc::new(RwLock::new(page));
        state.pages.insert(*pid, Arc::clone(&page_pod));
        state.recency.push_back(*pid);
        Ok(page_pod)
    }

    fn touch(state: &mut PoolState, pid: &PageId) {
        if let Some(pos) = state.recency.iter().position(|p| p == pid) {
            state.recency.remove(pos);
        }
        state.recency.push_back(*pid);
    }

    /// Pick the least recently used clean page, flush it (a no-op on
    /// disk for a clean page) and drop it from the cache. Dirty pages
    /// are not candidates; io failures keep the victim cached.
    fn evict(&self, state: &mut PoolState) -> PocketResult {
        let victim = state
            .recency
            .iter()
            .copied()
            .find(|pid| {
                state
                    .pages
                    .get(pid)
                    .map_or(false, |page| !page.rl().is_dirty())
            })
            .ok_or_else(|| {
                PocketError::new("cannot evict: all pages in the buffer pool are dirty")
            })?;

        self.flush_page_locked(state, &victim).map_err(|e| match e {
            PocketError::Io(io) => {
                PocketError::Db(format!("flush during eviction failed: {}", io))
            }
            other => other,
        })?;

        state.pages.remove(&victim);
        if let Some(pos) = state.recency.iter().position(|p| *p == victim) {
            state.recency.remove(pos);
        }
        debug!("page evicted, pid: {}", victim);
        Ok(())
    }

    // Write the content of a cached dirty page to disk, logging first.
    //
    // 1. record the page in the flushed index of its dirtier
    // 2. append the update record and force the log
    // 3. write the page through its table file
    // 4. clear the dirty bit
    //
    // Clean or absent pages are left alone.
    fn flush_page_locked(&self, state: &mut PoolState, pid: &PageId) -> PocketResult {
        let page_pod = match state.pages.get(pid) {
            Some(page_pod) => Arc::clone(page_pod),
            None => return Ok(()),
        };
        let tid = match page_pod.rl().get_dirtier() {
            Some(tid) => tid,
            None => return Ok(()),
        };

        state
            .flushed_by_tx
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(*pid);

        {
            let page = page_pod.rl();
            let mut log_manager = self.log_manager.wl();
            log_manager.log_write(&tid, pid, page.get_before_image(), page.get_page_data())?;
            log_manager.force()?;
        }

        let file = self.catalog.get_db_file(pid.table_id)?;
        file.write_page(&page_pod.rl())?;

        page_pod.wl().mark_dirty(None);
        debug!("page flushed, pid: {}, tid: {}", pid, tid);
        Ok(())
    }

    /// Flush every cached dirty page.
    ///
    /// NB: Be careful using this routine. It writes dirty data to disk,
    /// which breaks NO STEAL when any transaction is still active; it
    /// exists for shutdown and tests.
    pub fn flush_all_pages(&self) -> PocketResult {
        let mut state = self.state.lock().unwrap();
        let pids: Vec<PageId> = state.pages.keys().copied().collect();
        for pid in pids {
            self.flush_page_locked(&mut state, &pid)?;
        }
        Ok(())
    }

    /// Flush every cached page currently dirtied by `tid`.
    pub fn flush_pages(&self, tid: &TransactionId) -> PocketResult {
        let mut state = self.state.lock().unwrap();
        let pids = Self::dirtied_by(&state, tid);
        for pid in pids {
            self.flush_page_locked(&mut state, &pid)?;
        }
        Ok(())
    }

    fn dirtied_by(state: &PoolState, tid: &TransactionId) -> Vec<PageId> {
        state
            .pages
            .iter()
            .filter(|(_, page)| page.rl().get_dirtier() == Some(*tid))
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Finish the transaction. A commit flushes every page it dirtied
    /// and advances their before images; an abort discards the dirty
    /// versions by re-reading the on-disk image. Either way every lock
    /// the transaction holds is released afterwards.
    pub fn transaction_complete(&self, tid: &TransactionId, commit: bool) -> PocketResult {
        {
            let mut state = self.state.lock().unwrap();
            let dirtied = Self::dirtied_by(&state, tid);

            if commit {
                for pid in &dirtied {
                    self.flush_page_locked(&mut state, pid)?;
                    if let Some(page_pod) = state.pages.get(pid) {
                        page_pod.wl().set_before_image();
                    }
                }
                self.log_manager.wl().log_commit(tid)?;
            } else {
                for pid in &dirtied {
                    let file = self.catalog.get_db_file(pid.table_id)?;
                    let fresh = file.read_page(pid)?;
                    state.pages.insert(*pid, Arc::new(RwLock::new(fresh)));
                    debug!("page rolled back, pid: {}, tid: {}", pid, tid);
                }
                self.log_manager.wl().log_abort(tid)?;
            }
        }

        self.lock_manager.release_all_pages(tid);
        debug!("transaction finished, tid: {}, commit: {}", tid, commit);
        Ok(())
    }

    /// Add the tuple to the specified table on behalf of `tid`. The
    /// file acquires a write lock on every page it touches through
    /// `get_page`; the pages it reports back are marked dirty here.
    pub fn insert_tuple(
        &self,
        tid: &TransactionId,
        table_id: i32,
        tuple: &mut Tuple,
    ) -> PocketResult {
        let file = self.catalog.get_db_file(table_id)?;
        let dirtied = file.insert_tuple(tid, tuple, self)?;
        for page_pod in dirtied {
            page_pod.wl().mark_dirty(Some(*tid));
        }
        Ok(())
    }

    /// Remove the tuple from the table its record id names.
    pub fn delete_tuple(&self, tid: &TransactionId, tuple: &Tuple) -> PocketResult {
        let rid = tuple
            .get_record_id()
            .ok_or_else(|| PocketError::new("tuple has no record id"))?;
        let file = self.catalog.get_db_file(rid.pid.table_id)?;
        let page_pod = file.delete_tuple(tid, tuple, self)?;
        page_pod.wl().mark_dirty(Some(*tid));
        Ok(())
    }

    /// Release a single lock before the transaction completes. Unsafe
    /// in the general 2PL flow; reserved for callers that know the page
    /// was not modified (e.g. skipping a full page during insert).
    pub fn release_page(&self, tid: &TransactionId, pid: &PageId) {
        self.lock_manager.release_lock(tid, pid);
    }

    pub fn holds_lock(&self, tid: &TransactionId, pid: &PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Drop the page from the cache without flushing, along with its
    /// lock bookkeeping. Needed by the recovery path so the cache does
    /// not keep serving a rolled back page.
    pub fn discard_page(&self, pid: &PageId) {
        {
            let mut state = self.state.lock().unwrap();
            state.pages.remove(pid);
            if let Some(pos) = state.recency.iter().position(|p| p == pid) {
                state.recency.remove(pos);
            }
        }
        self.lock_manager.remove_page(pid);
        debug!("page discarded, pid: {}", pid);
    }

    pub fn resident_count(&self) -> usize {
        self.state.lock().unwrap().pages.len()
    }

    pub fn all_pids(&self) -> Vec<PageId> {
        self.state.lock().unwrap().pages.keys().copied().collect()
    }

    pub fn is_cached(&self, pid: &PageId) -> bool {
        self.state.lock().unwrap().pages.contains_key(pid)
    }

    /// Pages `tid` has flushed to disk so far (committed or not).
    pub fn flushed_pages(&self, tid: &TransactionId) -> HashSet<PageId> {
        let state = self.state.lock().unwrap();
        state.flushed_by_tx.get(tid).cloned().unwrap_or_default()
    }
}
