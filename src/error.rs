use std::{error::Error, fmt, io};

use backtrace::Backtrace;

/// The error type of the crate.
///
/// `Db` covers engine-level failures (cache exhausted, unknown table,
/// corrupted record). `TransactionAborted` is only ever produced by the
/// lock manager; the caller is expected to finish the transaction with
/// `transaction_complete(tid, false)`. `Io` wraps collaborator io errors.
#[derive(Debug)]
pub enum PocketError {
    Db(String),
    TransactionAborted,
    Io(io::Error),
}

impl PocketError {
    pub fn new(msg: &str) -> Self {
        PocketError::Db(msg.to_string())
    }

    /// Print the current backtrace to stderr. Handy when a test hits an
    /// unexpected error deep inside the engine.
    pub fn show_backtrace(&self) {
        let bt = Backtrace::new();
        eprintln!("{}\n{:?}", self, bt);
    }
}

impl fmt::Display for PocketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PocketError::Db(msg) => write!(f, "{}", msg),
            PocketError::TransactionAborted => write!(f, "transaction aborted"),
            PocketError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl Error for PocketError {}

impl From<io::Error> for PocketError {
    fn from(e: io::Error) -> Self {
        PocketError::Io(e)
    }
}
