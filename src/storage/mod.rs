pub mod heap_file;
pub mod page;
pub mod page_id;
pub mod tuple;

pub use heap_file::{DbFile, HeapFile};
pub use page::{empty_page_data, Page};
pub use page_id::PageId;
pub use tuple::{int_schema, RecordId, Schema, Tuple};
