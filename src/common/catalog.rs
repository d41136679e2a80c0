use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{error::PocketError, storage::heap_file::DbFile, utils::HandyRwLock};

/// Maps table ids to their files. Tables register once at startup (or
/// in a test's setup) and are looked up on every page load and flush.
pub struct Catalog {
    tables: RwLock<HashMap<i32, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, file: Arc<dyn DbFile>) {
        self.tables.wl().insert(file.get_id(), file);
    }

    pub fn get_db_file(&self, table_id: i32) -> Result<Arc<dyn DbFile>, PocketError> {
        self.tables
            .rl()
            .get(&table_id)
            .cloned()
            .ok_or_else(|| PocketError::Db(format!("table {} not found", table_id)))
    }

    pub fn tables_count(&self) -> usize {
        self.tables.rl().len()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
