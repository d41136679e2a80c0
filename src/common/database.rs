use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use crate::{
    buffer::BufferPool, common::catalog::Catalog, error::PocketError,
    transaction::lock_manager::LockManager, tx_log::log_manager::LogManager, types::Pod,
};

/// Wires the engine together: one catalog, one lock manager, one log
/// manager and one buffer pool per database instance. Components hold
/// `Arc`s to their collaborators, so a `Database` is just the assembly
/// point; tests construct as many instances as they like.
pub struct Database {
    path: PathBuf,

    catalog: Arc<Catalog>,
    lock_manager: Arc<LockManager>,
    log_manager: Pod<LogManager>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(dir: P, pool_capacity: usize) -> Result<Self, PocketError> {
        let path = dir.as_ref().to_path_buf();
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }

        let catalog = Arc::new(Catalog::new());
        let lock_manager = Arc::new(LockManager::new());
        let log_manager: Pod<LogManager> =
            Arc::new(RwLock::new(LogManager::new(path.join("wal.log"))?));
        let buffer_pool = Arc::new(BufferPool::new(
            Arc::clone(&catalog),
            Arc::clone(&log_manager),
            Arc::clone(&lock_manager),
            pool_capacity,
        ));

        Ok(Self {
            path,
            catalog,
            lock_manager,
            log_manager,
            buffer_pool,
        })
    }

    pub fn get_buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn get_catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn get_lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn get_log_manager(&self) -> &Pod<LogManager> {
        &self.log_manager
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }
}
