//! Error types for the component store.

use thiserror::Error;

/// Errors that can occur in the component store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying RocksDB failure. Fatal to the current operation.
    #[error("key-value store error: {0}")]
    Backend(#[from] rocksdb::Error),

    /// A stored value failed to decode; indicates corruption or a schema
    /// mismatch between releases of this crate.
    #[error("corrupt value in keyspace {keyspace}: {reason}")]
    Corrupt {
        /// The column family holding the bad value.
        keyspace: &'static str,
        /// Decoder diagnostic.
        reason: String,
    },

    /// A required column family is missing from the opened database.
    #[error("missing keyspace: {0}")]
    MissingKeyspace(&'static str),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn corrupt(keyspace: &'static str, err: bincode::Error) -> Self {
        StoreError::Corrupt {
            keyspace,
            reason: err.to_string(),
        }
    }
}
