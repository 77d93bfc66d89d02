//! Store Layer - The document database this crate sits in front of
//!
//! The `Store` trait is the whole contract:
//! - `get(key)` fetches a document or fails with `Error::NotFound`
//! - `query(statement)` streams JSON rows
//! - `run_ddl(statement)` reports success plus the store's error list

pub mod dialect;
pub mod memory;

pub use memory::MemoryStore;

use crate::document::{Document, Row};
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy stream of query rows
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Outcome of a DDL statement as reported by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlOutcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl DdlOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
        }
    }
}

/// Document store client
#[async_trait]
pub trait Store: Send + Sync {
    /// Store identifier substituted for the query placeholder
    fn name(&self) -> &str;

    /// Fetch a document by key
    async fn get(&self, key: &str) -> Result<Document>;

    /// Execute a query, streaming its rows
    async fn query(&self, statement: &str) -> Result<RowStream>;

    /// Execute an index DDL statement
    async fn run_ddl(&self, statement: &str) -> Result<DdlOutcome>;
}
