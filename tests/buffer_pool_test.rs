mod common;

use pocket_db::{utils::HandyRwLock, DbFile, PageId, Permission, PocketError, TransactionId};

use crate::common::{add_table, grow_pages, scratch_db};

#[test]
fn test_read_through_and_cache() {
    let db = scratch_db(2);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 3);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let p0 = PageId::new(0, 0);
    let p1 = PageId::new(0, 1);

    pool.get_page(&t1, &p0, Permission::ReadOnly).unwrap();
    pool.get_page(&t1, &p1, Permission::ReadOnly).unwrap();

    assert_eq!(pool.resident_count(), 2);
    assert!(pool.is_cached(&p0));
    assert!(pool.is_cached(&p1));
    assert!(pool.holds_lock(&t1, &p0));
    assert!(pool.holds_lock(&t1, &p1));

    // the cached instance is the unique one for the pid
    let again = pool.get_page(&t1, &p0, Permission::ReadOnly).unwrap();
    let first = pool.get_page(&t1, &p0, Permission::ReadOnly).unwrap();
    assert!(std::sync::Arc::ptr_eq(&again, &first));

    pool.transaction_complete(&t1, true).unwrap();
    assert!(!pool.holds_lock(&t1, &p0));
}

#[test]
fn test_evicts_least_recently_used_clean_page() {
    let db = scratch_db(2);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 3);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let p0 = PageId::new(0, 0);
    let p1 = PageId::new(0, 1);
    let p2 = PageId::new(0, 2);

    pool.get_page(&t1, &p0, Permission::ReadOnly).unwrap();
    pool.get_page(&t1, &p1, Permission::ReadOnly).unwrap();
    pool.get_page(&t1, &p2, Permission::ReadOnly).unwrap();

    assert_eq!(pool.resident_count(), 2);
    assert!(pool.is_cached(&p2));
    // p0 is the oldest clean page, so it goes first
    assert!(!pool.is_cached(&p0));
    assert!(pool.is_cached(&p1));

    pool.transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_cache_never_exceeds_capacity() {
    let db = scratch_db(3);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 10);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    for i in 0..10 {
        pool.get_page(&t1, &PageId::new(0, i), Permission::ReadOnly)
            .unwrap();
        assert!(pool.resident_count() <= 3);
    }

    pool.transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_eviction_blocked_when_all_pages_dirty() {
    let db = scratch_db(1);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 2);
    let pool = db.get_buffer_pool();

    // t1 dirties the only cache slot
    let t1 = TransactionId::new();
    let mut tuple = common::new_tuple(vec![1, 2]);
    pool.insert_tuple(&t1, 0, &mut tuple).unwrap();
    assert_eq!(pool.resident_count(), 1);

    // t2 wants another page; no clean victim exists
    let t2 = TransactionId::new();
    let p1 = PageId::new(0, 1);
    match pool.get_page(&t2, &p1, Permission::ReadOnly) {
        Err(PocketError::Db(_)) => {}
        other => panic!("expected a db error, got {:?}", other.map(|_| ())),
    }

    // once t1 commits, the slot is clean again and t2 can proceed
    pool.transaction_complete(&t1, true).unwrap();
    pool.get_page(&t2, &p1, Permission::ReadOnly).unwrap();
    pool.transaction_complete(&t2, true).unwrap();
}

#[test]
fn test_dirty_page_survives_eviction_pressure() {
    let db = scratch_db(2);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 3);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let p0 = PageId::new(0, 0);
    let p1 = PageId::new(0, 1);
    let p2 = PageId::new(0, 2);

    let mut tuple = common::new_tuple(vec![7, 8]);
    pool.insert_tuple(&t1, 0, &mut tuple).unwrap();
    assert_eq!(tuple.get_record_id().unwrap().pid, p0);

    pool.get_page(&t1, &p1, Permission::ReadOnly).unwrap();
    pool.get_page(&t1, &p2, Permission::ReadOnly).unwrap();

    // the dirty page is skipped; the clean one is the victim
    assert!(pool.is_cached(&p0));
    assert!(!pool.is_cached(&p1));
    assert!(pool.is_cached(&p2));

    // NO STEAL: the uncommitted row is not on disk
    let on_disk = file.read_page(&p0).unwrap();
    assert!(on_disk.used_slots().is_empty());

    pool.transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_flush_pages_writes_through_and_logs() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 1);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let mut tuple = common::new_tuple(vec![3, 4]);
    pool.insert_tuple(&t1, 0, &mut tuple).unwrap();
    let pid = tuple.get_record_id().unwrap().pid;

    pool.flush_pages(&t1).unwrap();

    // the page is on disk, clean in cache, and the flush is in the log
    let on_disk = file.read_page(&pid).unwrap();
    assert_eq!(on_disk.used_slots().len(), 1);

    let page_pod = pool.get_page(&t1, &pid, Permission::ReadWrite).unwrap();
    assert!(!page_pod.rl().is_dirty());

    assert!(pool.flushed_pages(&t1).contains(&pid));
    // START + UPDATE at least
    assert!(db.get_log_manager().rl().records_count() >= 2);

    pool.transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_flush_all_pages() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 1);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let mut tuple = common::new_tuple(vec![5, 6]);
    pool.insert_tuple(&t1, 0, &mut tuple).unwrap();

    pool.flush_all_pages().unwrap();

    let pid = tuple.get_record_id().unwrap().pid;
    let on_disk = file.read_page(&pid).unwrap();
    assert_eq!(on_disk.used_slots().len(), 1);

    pool.transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_discard_page_drops_cache_and_locks() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 1);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let p0 = PageId::new(0, 0);
    pool.get_page(&t1, &p0, Permission::ReadWrite).unwrap();

    pool.discard_page(&p0);
    assert!(!pool.is_cached(&p0));
    assert_eq!(pool.resident_count(), 0);
    assert!(!pool.holds_lock(&t1, &p0));
}

#[test]
fn test_release_page() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 2);
    grow_pages(&file, 1);
    let pool = db.get_buffer_pool();

    let t1 = TransactionId::new();
    let p0 = PageId::new(0, 0);
    pool.get_page(&t1, &p0, Permission::ReadOnly).unwrap();
    assert!(pool.holds_lock(&t1, &p0));

    pool.release_page(&t1, &p0);
    assert!(!pool.holds_lock(&t1, &p0));
}

#[test]
fn test_scan_matches_populated_data() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 2);
    let cells = common::populate_table(&file, 1200);
    assert!(file.num_pages() >= 2);

    let t1 = TransactionId::new();
    let found = file.scan_tuples(&t1, db.get_buffer_pool()).unwrap();
    assert_eq!(found.len(), cells.len());
    for (tuple, expected) in found.iter().zip(cells.iter()) {
        assert!(tuple.equal_cells(expected));
    }
    db.get_buffer_pool().transaction_complete(&t1, true).unwrap();
}

#[test]
fn test_insert_grows_full_table() {
    let db = scratch_db(10);
    let file = add_table(&db, 0, 64);
    let pool = db.get_buffer_pool();

    // 64 columns -> 256 byte rows -> 15 slots per page
    let t1 = TransactionId::new();
    let slots = 15;
    for i in 0..slots + 1 {
        let mut tuple = common::new_tuple(vec![i as i32; 64]);
        pool.insert_tuple(&t1, 0, &mut tuple).unwrap();
    }
    pool.transaction_complete(&t1, true).unwrap();

    assert_eq!(file.num_pages(), 2);

    let t2 = TransactionId::new();
    let tuples = file.scan_tuples(&t2, pool).unwrap();
    assert_eq!(tuples.len(), slots + 1);
    pool.transaction_complete(&t2, true).unwrap();
}
