pub mod buffer_pool;

pub use buffer_pool::{BufferPool, DEFAULT_PAGES, PAGE_SIZE};
