pub mod lock_manager;
pub mod transaction_id;

pub use lock_manager::{LockManager, Permission};
pub use transaction_id::TransactionId;
