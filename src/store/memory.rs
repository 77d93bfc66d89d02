//! In-memory store implementation
//!
//! Suitable for tests and local experiments. Documents live in a sorted map,
//! index state is tracked so DDL behaves like the real store (duplicate and
//! unknown index names are reported as errors), and every statement sent to
//! the store is recorded.

use super::dialect::{self, Filter, ParsedStatement, Projection};
use super::{DdlOutcome, RowStream, Store};
use crate::document::{Document, Row};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// Name the store gives an unnamed primary index
pub const DEFAULT_PRIMARY_INDEX: &str = "#primary";

/// Index definition held by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDef {
    Primary,
    Secondary {
        fields: Vec<String>,
        filter: Option<Filter>,
    },
}

/// In-memory document store
pub struct MemoryStore {
    name: String,
    documents: RwLock<BTreeMap<String, Value>>,
    indexes: RwLock<HashMap<String, IndexDef>>,
    statements: Mutex<Vec<String>>,
    failing_keys: RwLock<HashSet<String>>,
}

impl MemoryStore {
    /// Create an empty store with the given identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(HashMap::new()),
            statements: Mutex::new(Vec::new()),
            failing_keys: RwLock::new(HashSet::new()),
        }
    }

    /// Load documents from a JSON file shaped as `{"key": body, ...}`
    pub fn from_json_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        let Value::Object(entries) = value else {
            return Err(Error::InvalidArgument(format!(
                "{} must contain a JSON object keyed by document key",
                path.display()
            )));
        };

        let store = Self::new(name);
        for (key, body) in entries {
            store.insert(key, body)?;
        }
        tracing::debug!("Loaded {} documents from {}", store.len(), path.display());
        Ok(store)
    }

    /// Insert or replace a document
    pub fn insert(&self, key: impl Into<String>, body: Value) -> Result<()> {
        self.documents
            .write()
            .map_err(|_| poisoned("documents"))?
            .insert(key.into(), body);
        Ok(())
    }

    /// Builder-style insert, for test fixtures
    pub fn with_document(self, key: impl Into<String>, body: Value) -> Self {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(key.into(), body);
        }
        self
    }

    /// Remove a document, returning its body
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .write()
            .map_err(|_| poisoned("documents"))?
            .remove(key))
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `get(key)` fail with a store error
    pub fn fail_get(&self, key: impl Into<String>) {
        if let Ok(mut keys) = self.failing_keys.write() {
            keys.insert(key.into());
        }
    }

    /// Every statement received by `query` and `run_ddl`, in arrival order
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent statement received
    pub fn last_statement(&self) -> Option<String> {
        self.statements.lock().ok().and_then(|s| s.last().cloned())
    }

    /// Names of the indexes currently defined, sorted
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .indexes
            .read()
            .map(|i| i.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Definition of a named index
    pub fn index(&self, name: &str) -> Option<IndexDef> {
        self.indexes.read().ok().and_then(|i| i.get(name).cloned())
    }

    fn record(&self, statement: &str) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(statement.to_string());
        }
    }

    fn check_keyspace(&self, keyspace: &str) -> std::result::Result<(), String> {
        if keyspace == self.name {
            Ok(())
        } else {
            Err(format!("Keyspace not found: {}", keyspace))
        }
    }

    fn apply_ddl(&self, parsed: ParsedStatement) -> Result<DdlOutcome> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned("indexes"))?;

        let outcome = match parsed {
            ParsedStatement::CreatePrimaryIndex { name, keyspace } => {
                if let Err(e) = self.check_keyspace(&keyspace) {
                    return Ok(DdlOutcome::failed(e));
                }
                let name = name.unwrap_or_else(|| DEFAULT_PRIMARY_INDEX.to_string());
                if indexes.contains_key(&name) {
                    DdlOutcome::failed(format!("Index {} already exists", name))
                } else {
                    indexes.insert(name, IndexDef::Primary);
                    DdlOutcome::ok()
                }
            }
            ParsedStatement::DropPrimaryIndex { keyspace } => {
                if let Err(e) = self.check_keyspace(&keyspace) {
                    return Ok(DdlOutcome::failed(e));
                }
                match indexes.get(DEFAULT_PRIMARY_INDEX) {
                    Some(IndexDef::Primary) => {
                        indexes.remove(DEFAULT_PRIMARY_INDEX);
                        DdlOutcome::ok()
                    }
                    _ => DdlOutcome::failed(format!(
                        "Primary index {} not found",
                        DEFAULT_PRIMARY_INDEX
                    )),
                }
            }
            ParsedStatement::CreateIndex {
                name,
                keyspace,
                fields,
                filter,
            } => {
                if let Err(e) = self.check_keyspace(&keyspace) {
                    return Ok(DdlOutcome::failed(e));
                }
                if indexes.contains_key(&name) {
                    DdlOutcome::failed(format!("Index {} already exists", name))
                } else {
                    indexes.insert(name, IndexDef::Secondary { fields, filter });
                    DdlOutcome::ok()
                }
            }
            ParsedStatement::DropIndex { keyspace, name } => {
                if let Err(e) = self.check_keyspace(&keyspace) {
                    return Ok(DdlOutcome::failed(e));
                }
                if indexes.remove(&name).is_some() {
                    DdlOutcome::ok()
                } else {
                    DdlOutcome::failed(format!("Index not found: {}", name))
                }
            }
            ParsedStatement::Select { .. } => {
                DdlOutcome::failed("Statement is not an index definition")
            }
        };

        Ok(outcome)
    }

    fn has_usable_index(&self, filter: Option<&Filter>) -> Result<bool> {
        let indexes = self.indexes.read().map_err(|_| poisoned("indexes"))?;
        Ok(indexes.values().any(|def| match def {
            IndexDef::Primary => true,
            IndexDef::Secondary {
                fields,
                filter: index_filter,
            } => match filter {
                Some(f) => {
                    fields.first() == Some(&f.field)
                        && index_filter.as_ref().is_none_or(|idx| idx == f)
                }
                None => false,
            },
        }))
    }

    fn select(
        &self,
        projection: &Projection,
        keyspace: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Row>> {
        self.check_keyspace(keyspace)
            .map_err(|e| Error::StoreQuery(vec![e]))?;

        if !self.has_usable_index(filter)? {
            return Err(Error::StoreQuery(vec![format!(
                "No index available on keyspace `{}` that matches your query. Use CREATE PRIMARY INDEX ON `{}` to create a primary index",
                self.name, self.name
            )]));
        }

        let documents = self.documents.read().map_err(|_| poisoned("documents"))?;
        let rows = documents
            .values()
            .filter(|body| match filter {
                Some(f) => body.get(&f.field).and_then(Value::as_str) == Some(f.value.as_str()),
                None => true,
            })
            .map(|body| project(&self.name, projection, body))
            .collect();

        Ok(rows)
    }
}

fn project(store: &str, projection: &Projection, body: &Value) -> Row {
    let mut row = Row::new();
    match projection {
        Projection::All => {
            row.insert(store.to_string(), body.clone());
        }
        Projection::Fields(fields) => {
            for field in fields {
                if let Some(value) = body.get(field) {
                    row.insert(field.clone(), value.clone());
                }
            }
        }
    }
    row
}

fn poisoned(what: &str) -> Error {
    Error::Store(format!("{} lock poisoned", what))
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Document> {
        if self
            .failing_keys
            .read()
            .map_err(|_| poisoned("failing keys"))?
            .contains(key)
        {
            return Err(Error::Store(format!("injected failure for {}", key)));
        }

        let documents = self.documents.read().map_err(|_| poisoned("documents"))?;
        documents
            .get(key)
            .map(|body| Document::new(key, body.clone()))
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn query(&self, statement: &str) -> Result<RowStream> {
        self.record(statement);

        let parsed = dialect::parse(statement)?;
        if parsed.is_ddl() {
            let outcome = self.apply_ddl(parsed)?;
            if !outcome.success {
                return Err(Error::StoreQuery(outcome.errors));
            }
            return Ok(futures::stream::empty::<Result<Row>>().boxed());
        }

        let ParsedStatement::Select {
            projection,
            keyspace,
            filter,
        } = parsed
        else {
            return Err(Error::StoreQuery(vec!["unsupported statement".to_string()]));
        };

        let rows = self.select(&projection, &keyspace, filter.as_ref())?;
        Ok(futures::stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn run_ddl(&self, statement: &str) -> Result<DdlOutcome> {
        self.record(statement);

        match dialect::parse(statement) {
            Ok(parsed) => self.apply_ddl(parsed),
            Err(Error::StoreQuery(errors)) => Ok(DdlOutcome {
                success: false,
                errors,
            }),
            Err(e) => Err(e),
        }
    }
}
