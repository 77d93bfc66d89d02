//! # cbjoint - Document store query and reference helpers
//!
//! A thin layer in front of a document-oriented key/value store.
//!
//! cbjoint provides:
//! - `Joint`: follows a foreign-key path inside documents and fetches the
//!   referenced documents concurrently
//! - `N1ql`: fluent query builder with a blocking facade over an async core,
//!   store placeholder substitution and row mapping
//! - `IndexManager`: primary and secondary index DDL
//! - `MemoryStore`: in-process store implementation for tests and the CLI

pub mod config;
pub mod document;
pub mod index;
pub mod joint;
pub mod path;
pub mod query;
pub mod runtime;
pub mod statement;
pub mod store;

// Re-exports for convenient access
pub use document::{Document, Row};
pub use index::{IndexManager, IndexSpec, IndexStatement};
pub use joint::Joint;
pub use path::{DottedPathExtractor, ExtractedKeys, PathExtractor, ReferencePath};
pub use query::{AsyncQuery, Entity, N1ql};
pub use statement::{QueryStatement, Statement, DEFAULT_PLACEHOLDER};
pub use store::{DdlOutcome, MemoryStore, RowStream, Store};

/// Result type alias for cbjoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cbjoint operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Path resolution error: {0}")]
    PathResolution(String),

    #[error("Referenced document not found: {0}")]
    ReferenceNotFound(String),

    #[error("Failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("No statement set, call query() before execute()")]
    NoStatementSet,

    #[error("Query failed: {}", .0.join("; "))]
    StoreQuery(Vec<String>),

    #[error("Failed to map row {index}: {source}")]
    Mapping {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Index operation failed ({statement}): {}", .errors.join("; "))]
    IndexOperation {
        statement: String,
        errors: Vec<String>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// True for the errors a store reports when a key is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
