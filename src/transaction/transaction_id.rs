use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::io::Encodeable;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique transaction identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId {
    // increase monotonically by 1
    id: u64,
}

impl TransactionId {
    pub fn new() -> Self {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        Self { id }
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Encodeable for TransactionId {
    fn encode(&self) -> Vec<u8> {
        self.id.encode()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
