//! Document types
//!
//! A `Document` is a store entry identified by an opaque key with a JSON body.
//! A `Row` is one JSON object produced by a query.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single query result row.
pub type Row = serde_json::Map<String, Value>;

/// A document as returned by the store.
///
/// The body is owned by the caller once fetched; nothing in this crate
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store key
    pub key: String,
    /// JSON content
    pub body: Value,
}

impl Document {
    /// Create a new document
    pub fn new(key: impl Into<String>, body: Value) -> Self {
        Self {
            key: key.into(),
            body,
        }
    }

    /// Body rendered as a JSON string
    pub fn content(&self) -> String {
        self.body.to_string()
    }

    /// Look up a top-level field of the body
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.body)
    }
}
