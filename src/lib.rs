pub mod buffer;
pub mod common;
pub mod error;
pub mod io;
pub mod storage;
pub mod transaction;
pub mod tx_log;
pub mod types;
pub mod utils;

pub use buffer::{BufferPool, DEFAULT_PAGES, PAGE_SIZE};
pub use common::{Catalog, Database};
pub use error::PocketError;
pub use storage::{int_schema, DbFile, HeapFile, Page, PageId, RecordId, Schema, Tuple};
pub use transaction::{LockManager, Permission, TransactionId};
pub use tx_log::LogManager;
