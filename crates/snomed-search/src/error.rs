//! Error types for search and ECL evaluation.

use thiserror::Error;

/// Errors that can occur building or querying the search index.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Underlying index library failure.
    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// Store failure while assembling documents or realizing sets.
    #[error(transparent)]
    Store(#[from] snomed_store::StoreError),

    /// A query was structurally invalid, e.g. a cardinality with
    /// `max < min` or an empty refset set.
    #[error("invalid query: {0}")]
    Query(String),

    /// An ECL feature this evaluator deliberately does not approximate.
    #[error("unsupported ECL feature: {0}")]
    Unsupported(String),
}

/// Result type for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
