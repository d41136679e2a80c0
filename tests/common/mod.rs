#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rand::Rng;

use pocket_db::{
    int_schema,
    io::Encodeable,
    storage::{empty_page_data, Page},
    utils, Database, DbFile, HeapFile, PageId, Tuple,
};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// Set up log output for a test. Safe to call any number of times.
pub fn setup() {
    utils::init_log();
}

/// A fresh database under a scratch directory unique to this test run.
pub fn scratch_db(pool_capacity: usize) -> Database {
    setup();

    let n = NEXT_DB.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "pocket_db_test_{}_{}",
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    Database::new(&dir, pool_capacity).unwrap()
}

/// Create a heap table with all-i32 columns and register it.
pub fn add_table(db: &Database, table_id: i32, columns: usize) -> Arc<HeapFile> {
    let schema = int_schema(columns);
    let path = db.get_path().join(format!("table_{}.dat", table_id));
    let file = Arc::new(HeapFile::new(path, table_id, schema).unwrap());
    db.get_catalog().add_table(Arc::clone(&file) as Arc<dyn DbFile>);
    file
}

/// Extend the table file with zeroed pages so they can be read through
/// the pool.
pub fn grow_pages(file: &HeapFile, pages: usize) {
    let row_size = file.get_schema().get_row_size();
    for i in 0..pages {
        let pid = PageId::new(file.get_id(), i as i32);
        let page = Page::new(pid, empty_page_data(), row_size);
        file.write_page(&page).unwrap();
    }
}

/// Fill the table with random rows, written straight to disk (this is
/// setup, not a transaction). Returns the rows in insertion order.
pub fn populate_table(file: &HeapFile, rows: usize) -> Vec<Vec<i32>> {
    let schema = file.get_schema();
    let row_size = schema.get_row_size();
    let mut rng = rand::thread_rng();
    let mut all_cells: Vec<Vec<i32>> = Vec::new();

    let slots = Page::new(PageId::new(file.get_id(), 0), empty_page_data(), row_size).slot_count();
    let pages = ((rows + slots - 1) / slots).max(1);

    let mut remaining = rows;
    for page_index in 0..pages {
        let pid = PageId::new(file.get_id(), page_index as i32);
        let mut page = Page::new(pid, empty_page_data(), row_size);

        let count = remaining.min(slots);
        for _ in 0..count {
            let cells: Vec<i32> = (0..schema.get_columns())
                .map(|_| rng.gen_range(-10_000, 10_000))
                .collect();
            page.insert_row(&Tuple::new(cells.clone()).encode()).unwrap();
            all_cells.push(cells);
        }
        remaining -= count;

        file.write_page(&page).unwrap();
    }

    all_cells
}

pub fn new_tuple(cells: Vec<i32>) -> Tuple {
    Tuple::new(cells)
}
