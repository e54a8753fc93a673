//! Error types for RF2 ingestion.

use thiserror::Error;

/// Errors that can occur while classifying, parsing or importing RF2 files.
#[derive(Error, Debug)]
pub enum Rf2Error {
    /// A row failed to parse. Recoverable: the batch continues and the
    /// failure is counted in the import summary.
    #[error("bad RF2 row: {reason}")]
    Parse {
        /// What was wrong with the row.
        reason: String,
    },

    /// A file name did not follow the RF2 naming convention.
    #[error("unrecognized RF2 file name: {0}")]
    Filename(String),

    /// Filesystem failure while reading release files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store write failure. Fatal to the current ingestion.
    #[error(transparent)]
    Store(#[from] snomed_store::StoreError),
}

/// Result type for RF2 operations.
pub type Rf2Result<T> = std::result::Result<T, Rf2Error>;

impl Rf2Error {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Rf2Error::Parse {
            reason: reason.into(),
        }
    }
}
