use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

use log::debug;
use rand::Rng;

use crate::{
    error::PocketError, storage::page_id::PageId, transaction::transaction_id::TransactionId,
    types::PocketResult,
};

/// Retry delay when the transaction already holds at least one lock.
const BLOCK_DELAY_SHORT: u64 = 10;

/// Retry delay when the transaction holds nothing yet.
const BLOCK_DELAY_LONG: u64 = 100;

/// Wait budget (ms) for a transaction's first lock.
const WAIT_BUDGET_FIRST_LOCK: u64 = 250;

/// Wait budget (ms) once the transaction holds other locks.
const WAIT_BUDGET_LATER_LOCK: u64 = 500;

/// Upper bound of the random jitter added to every retry sleep.
const RAND_RANGE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// All lock state lives behind a single mutex, so every grant decision
/// is atomic with respect to every other call on the manager.
///
/// `read_holders`/`write_holder` are the primary maps; `shared_by_tx`/
/// `exclusive_by_tx` are their inverse indexes used for bulk release.
/// A forced acquisition may leave preempted readers' inverse entries
/// stale until they abort, so anything answering "who holds this page"
/// must consult the primary maps only.
struct LockTables {
    read_holders: HashMap<PageId, HashSet<TransactionId>>,
    write_holder: HashMap<PageId, TransactionId>,

    shared_by_tx: HashMap<TransactionId, HashSet<PageId>>,
    exclusive_by_tx: HashMap<TransactionId, HashSet<PageId>>,

    /// handle of the thread each waiting transaction runs on, so a
    /// forced writer can cut a victim's sleep short
    tx_thread: HashMap<TransactionId, thread::Thread>,

    /// transactions preempted by a forced writer; they observe the flag
    /// at their next lock request and abort
    interrupted: HashSet<TransactionId>,
}

pub struct LockManager {
    tables: Mutex<LockTables>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(LockTables {
                read_holders: HashMap::new(),
                write_holder: HashMap::new(),
                shared_by_tx: HashMap::new(),
                exclusive_by_tx: HashMap::new(),
                tx_thread: HashMap::new(),
                interrupted: HashSet::new(),
            }),
        }
    }

    /// Synchronous grant attempt. Returns true iff the lock is held by
    /// `tid` when the call returns.
    pub fn grant_lock(&self, tid: &TransactionId, pid: &PageId, perm: Permission) -> bool {
        let mut tables = self.tables.lock().unwrap();
        Self::add_lock(&mut tables, tid, pid, perm, false)
    }

    /// The normal entry point: keep attempting the grant, sleeping
    /// between attempts, until it succeeds or the wait budget runs out.
    ///
    /// A read request that exhausts its budget aborts. A write request
    /// re-enters the loop with `force` set and a fresh clock; the forced
    /// attempt may preempt the readers of the page (see `add_lock`),
    /// which is the crate's deadlock breaker.
    pub fn request_lock(
        &self,
        tid: &TransactionId,
        pid: &PageId,
        perm: Permission,
    ) -> PocketResult {
        let (block_delay, wait_budget) = {
            let mut tables = self.tables.lock().unwrap();
            tables
                .tx_thread
                .entry(*tid)
                .or_insert_with(thread::current);

            if Self::holds_any_lock(&tables, tid) {
                (BLOCK_DELAY_SHORT, WAIT_BUDGET_LATER_LOCK)
            } else {
                (BLOCK_DELAY_LONG, WAIT_BUDGET_FIRST_LOCK)
            }
        };

        let mut rng = rand::thread_rng();
        let mut force = false;
        let mut start_time = Instant::now();
        loop {
            {
                let mut tables = self.tables.lock().unwrap();
                if tables.interrupted.remove(tid) {
                    tables.tx_thread.remove(tid);
                    debug!("lock wait interrupted, tid: {}, pid: {}", tid, pid);
                    return Err(PocketError::TransactionAborted);
                }

                if Self::add_lock(&mut tables, tid, pid, perm, force) {
                    debug!("lock acquired, tid: {}, pid: {}, perm: {:?}", tid, pid, perm);
                    return Ok(());
                }
            }

            thread::park_timeout(Duration::from_millis(
                block_delay + rng.gen_range(0, RAND_RANGE),
            ));

            if start_time.elapsed() >= Duration::from_millis(wait_budget) {
                match perm {
                    Permission::ReadOnly => {
                        {
                            let mut tables = self.tables.lock().unwrap();
                            tables.tx_thread.remove(tid);
                        }
                        debug!(
                            "lock wait timed out, tid: {}, pid: {}, manager: {:?}",
                            tid, pid, self
                        );
                        return Err(PocketError::TransactionAborted);
                    }
                    Permission::ReadWrite => {
                        // a writer that has waited its budget may preempt
                        // the readers of the page
                        force = true;
                        start_time = Instant::now();
                    }
                }
            }
        }
    }

    // Attempt a grant against the current state. The rules are evaluated
    // in a fixed order; the first matching rule wins:
    //
    // 1. the page is unlocked
    // 2. shared request and no foreign writer
    // 3. upgrade: the sole reader asks for the write lock
    // 4. the requester is already the writer (idempotent)
    // 5. forced write and no current writer: preempt the readers
    //
    // Anything else fails and the caller retries or gives up.
    fn add_lock(
        tables: &mut LockTables,
        tid: &TransactionId,
        pid: &PageId,
        perm: Permission,
        force: bool,
    ) -> bool {
        let no_readers = tables
            .read_holders
            .get(pid)
            .map_or(true, |readers| readers.is_empty());
        let writer = tables.write_holder.get(pid).copied();

        if no_readers && writer.is_none() {
            Self::grant(tables, tid, pid, perm);
            return true;
        }

        if perm == Permission::ReadOnly && (writer.is_none() || writer == Some(*tid)) {
            Self::grant_shared(tables, tid, pid);
            return true;
        }

        if perm == Permission::ReadWrite {
            let sole_reader = tables
                .read_holders
                .get(pid)
                .map_or(false, |readers| readers.len() == 1 && readers.contains(tid));
            if sole_reader {
                Self::grant_exclusive(tables, tid, pid);
                return true;
            }

            if writer == Some(*tid) {
                return true;
            }

            if force && writer.is_none() {
                if let Some(readers) = tables.read_holders.remove(pid) {
                    for reader in readers {
                        if reader == *tid {
                            continue;
                        }
                        debug!("preempting reader, tid: {}, pid: {}", reader, pid);
                        tables.interrupted.insert(reader);
                        if let Some(handle) = tables.tx_thread.get(&reader) {
                            handle.unpark();
                        }
                    }
                }
                // the preempted readers' inverse entries stay until they
                // run their own abort path
                Self::grant_exclusive(tables, tid, pid);
                return true;
            }
        }

        false
    }

    fn grant(tables: &mut LockTables, tid: &TransactionId, pid: &PageId, perm: Permission) {
        match perm {
            Permission::ReadOnly => Self::grant_shared(tables, tid, pid),
            Permission::ReadWrite => Self::grant_exclusive(tables, tid, pid),
        }
    }

    fn grant_shared(tables: &mut LockTables, tid: &TransactionId, pid: &PageId) {
        tables
            .read_holders
            .entry(*pid)
            .or_insert_with(HashSet::new)
            .insert(*tid);
        tables
            .shared_by_tx
            .entry(*tid)
            .or_insert_with(HashSet::new)
            .insert(*pid);
    }

    fn grant_exclusive(tables: &mut LockTables, tid: &TransactionId, pid: &PageId) {
        tables.write_holder.insert(*pid, *tid);
        tables
            .exclusive_by_tx
            .entry(*tid)
            .or_insert_with(HashSet::new)
            .insert(*pid);
    }

    fn holds_any_lock(tables: &LockTables, tid: &TransactionId) -> bool {
        tables
            .shared_by_tx
            .get(tid)
            .map_or(false, |pages| !pages.is_empty())
            || tables
                .exclusive_by_tx
                .get(tid)
                .map_or(false, |pages| !pages.is_empty())
    }

    /// Release whatever lock `tid` holds on `pid`.
    pub fn release_lock(&self, tid: &TransactionId, pid: &PageId) {
        let mut tables = self.tables.lock().unwrap();
        Self::remove_lock(&mut tables, tid, pid);
        debug!("lock released, tid: {}, pid: {}", tid, pid);
    }

    fn remove_lock(tables: &mut LockTables, tid: &TransactionId, pid: &PageId) {
        if let Some(readers) = tables.read_holders.get_mut(pid) {
            readers.remove(tid);
            if readers.is_empty() {
                tables.read_holders.remove(pid);
            }
        }

        // only the current writer may clear the write entry
        if tables.write_holder.get(pid) == Some(tid) {
            tables.write_holder.remove(pid);
        }

        if let Some(pages) = tables.shared_by_tx.get_mut(tid) {
            pages.remove(pid);
            if pages.is_empty() {
                tables.shared_by_tx.remove(tid);
            }
        }
        if let Some(pages) = tables.exclusive_by_tx.get_mut(tid) {
            pages.remove(pid);
            if pages.is_empty() {
                tables.exclusive_by_tx.remove(tid);
            }
        }
    }

    /// Release every lock `tid` holds and drop its bookkeeping. Called
    /// on transaction completion, whatever the outcome.
    pub fn release_all_pages(&self, tid: &TransactionId) {
        let mut tables = self.tables.lock().unwrap();

        let mut pids: Vec<PageId> = Vec::new();
        if let Some(pages) = tables.shared_by_tx.get(tid) {
            pids.extend(pages.iter().copied());
        }
        if let Some(pages) = tables.exclusive_by_tx.get(tid) {
            pids.extend(pages.iter().copied());
        }
        for pid in pids {
            Self::remove_lock(&mut tables, tid, &pid);
        }

        tables.shared_by_tx.remove(tid);
        tables.exclusive_by_tx.remove(tid);
        tables.tx_thread.remove(tid);
        tables.interrupted.remove(tid);
        debug!("all locks released, tid: {}", tid);
    }

    pub fn holds_lock(&self, tid: &TransactionId, pid: &PageId) -> bool {
        let tables = self.tables.lock().unwrap();
        tables
            .read_holders
            .get(pid)
            .map_or(false, |readers| readers.contains(tid))
            || tables.write_holder.get(pid) == Some(tid)
    }

    /// Drop every piece of lock bookkeeping for `pid`. Used when the
    /// page itself is discarded from the cache.
    pub fn remove_page(&self, pid: &PageId) {
        let mut tables = self.tables.lock().unwrap();
        tables.read_holders.remove(pid);
        tables.write_holder.remove(pid);
        for pages in tables.shared_by_tx.values_mut() {
            pages.remove(pid);
        }
        for pages in tables.exclusive_by_tx.values_mut() {
            pages.remove(pid);
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tables = self.tables.lock().unwrap();

        let mut depiction = "\n".to_string();
        depiction.push_str("read_holders: {");
        for (pid, readers) in tables.read_holders.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", pid.get_short_repr(), readers));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("write_holder: {");
        for (pid, writer) in tables.write_holder.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", pid.get_short_repr(), writer));
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}
