//! Index management
//!
//! Renders primary and secondary index DDL and runs it through the store.
//! Each call blocks until the store answers. A failed DDL statement becomes
//! `Error::IndexOperation` carrying the store's raw error list; nothing is
//! retried and "already exists" is not special-cased.
//!
//! Generated statements:
//! - `CREATE PRIMARY INDEX [name] ON `store``
//! - `DROP PRIMARY INDEX ON `store`` or `DROP INDEX `store`.name`
//! - `CREATE INDEX name ON `store`(target,extra...) WHERE target = "value"`
//! - `DROP INDEX `store`.name`
//!
//! No `USING GSI` clause is appended; the store's default index type applies.

use crate::runtime;
use crate::statement::{identifier, quote_identifier, string_literal, Statement};
use crate::store::Store;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Description of an index to create.
///
/// A spec without `target_field` describes a primary index. Secondary
/// indexes need both `target_field` and `filter_value`, plus a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: Option<String>,
    pub target_field: Option<String>,
    #[serde(default)]
    pub additional_fields: Vec<String>,
    pub filter_value: Option<String>,
}

impl IndexSpec {
    /// Primary index, optionally named
    pub fn primary(name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            ..Self::default()
        }
    }

    /// Secondary index filtered on `target_field = filter_value`
    pub fn secondary(
        name: impl Into<String>,
        filter_value: impl Into<String>,
        target_field: impl Into<String>,
        additional_fields: Vec<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            target_field: Some(target_field.into()),
            additional_fields,
            filter_value: Some(filter_value.into()),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.target_field.is_none()
    }

    /// Check the spec is complete enough to render
    pub fn validate(&self) -> Result<()> {
        if self.is_primary() {
            if !self.additional_fields.is_empty() || self.filter_value.is_some() {
                return Err(Error::InvalidArgument(
                    "primary index takes no fields or filter".to_string(),
                ));
            }
            return Ok(());
        }

        if self.name.as_deref().is_none_or(str::is_empty) {
            return Err(Error::InvalidArgument(
                "secondary index requires a name".to_string(),
            ));
        }
        if self.target_field.as_deref().is_some_and(str::is_empty) {
            return Err(Error::InvalidArgument(
                "secondary index requires a target field".to_string(),
            ));
        }
        if self.filter_value.is_none() {
            return Err(Error::InvalidArgument(
                "secondary index requires a filter value".to_string(),
            ));
        }
        Ok(())
    }

    /// Creation statement for `store`
    pub fn create_statement(&self, store: &str) -> Result<IndexStatement> {
        self.validate()?;
        match (&self.target_field, &self.filter_value, &self.name) {
            (Some(target_field), Some(filter_value), Some(name)) => Ok(IndexStatement::CreateSecondary {
                store: store.to_string(),
                name: name.clone(),
                target_field: target_field.clone(),
                additional_fields: self.additional_fields.clone(),
                filter_value: filter_value.clone(),
            }),
            _ => Ok(IndexStatement::CreatePrimary {
                store: store.to_string(),
                name: self.name.clone(),
            }),
        }
    }
}

/// Index DDL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatement {
    CreatePrimary {
        store: String,
        name: Option<String>,
    },
    DropPrimary {
        store: String,
        name: Option<String>,
    },
    CreateSecondary {
        store: String,
        name: String,
        target_field: String,
        additional_fields: Vec<String>,
        filter_value: String,
    },
    DropSecondary {
        store: String,
        name: String,
    },
}

impl fmt::Display for IndexStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStatement::CreatePrimary { store, name: None } => {
                write!(f, "CREATE PRIMARY INDEX ON {}", quote_identifier(store))
            }
            IndexStatement::CreatePrimary {
                store,
                name: Some(name),
            } => write!(
                f,
                "CREATE PRIMARY INDEX {} ON {}",
                identifier(name),
                quote_identifier(store)
            ),
            IndexStatement::DropPrimary { store, name: None } => {
                write!(f, "DROP PRIMARY INDEX ON {}", quote_identifier(store))
            }
            IndexStatement::DropPrimary {
                store,
                name: Some(name),
            }
            | IndexStatement::DropSecondary { store, name } => {
                write!(f, "DROP INDEX {}.{}", quote_identifier(store), identifier(name))
            }
            IndexStatement::CreateSecondary {
                store,
                name,
                target_field,
                additional_fields,
                filter_value,
            } => {
                // Target field first, then additional fields in caller order
                let fields: Vec<String> = std::iter::once(target_field)
                    .chain(additional_fields)
                    .map(|field| identifier(field))
                    .collect();
                write!(
                    f,
                    "CREATE INDEX {} ON {}({}) WHERE {} = {}",
                    identifier(name),
                    quote_identifier(store),
                    fields.join(","),
                    identifier(target_field),
                    string_literal(filter_value)
                )
            }
        }
    }
}

impl Statement for IndexStatement {}

/// Issues index DDL against a store
pub struct IndexManager {
    store: Arc<dyn Store>,
}

impl IndexManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the primary index; `None` uses the store's default name
    pub fn create_primary_index(&self, name: Option<&str>) -> Result<()> {
        self.run(IndexStatement::CreatePrimary {
            store: self.store.name().to_string(),
            name: name.map(str::to_string),
        })
    }

    /// Drop the primary index; `None` targets the store's default name
    pub fn drop_primary_index(&self, name: Option<&str>) -> Result<()> {
        self.run(IndexStatement::DropPrimary {
            store: self.store.name().to_string(),
            name: name.map(str::to_string),
        })
    }

    /// Create a (covering) secondary index over documents where
    /// `target_field = filter_value`.
    ///
    /// `create_secondary_index("idx", "com.acme.Foo", "_class", &["f1", "f2"])`
    /// generates
    /// `CREATE INDEX idx ON `store`(_class,f1,f2) WHERE _class = "com.acme.Foo"`.
    pub fn create_secondary_index<S: AsRef<str>>(
        &self,
        name: &str,
        filter_value: &str,
        target_field: &str,
        additional_fields: &[S],
    ) -> Result<()> {
        let spec = IndexSpec::secondary(
            name,
            filter_value,
            target_field,
            additional_fields.iter().map(|f| f.as_ref().to_string()).collect(),
        );
        self.create_index(&spec)
    }

    /// Drop a secondary index by name
    pub fn drop_secondary_index(&self, name: &str) -> Result<()> {
        self.run(IndexStatement::DropSecondary {
            store: self.store.name().to_string(),
            name: name.to_string(),
        })
    }

    /// Create the index described by `spec`
    pub fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let statement = spec.create_statement(self.store.name())?;
        self.run(statement)
    }

    fn run(&self, statement: IndexStatement) -> Result<()> {
        runtime::block_on(self.run_async(statement))?
    }

    async fn run_async(&self, statement: IndexStatement) -> Result<()> {
        let text = statement.to_string();
        tracing::debug!("Running index DDL: {}", text);

        let outcome = self.store.run_ddl(&text).await?;
        if outcome.success {
            tracing::info!("Index statement succeeded: {}", text);
            Ok(())
        } else {
            tracing::warn!("Index statement failed: {} ({:?})", text, outcome.errors);
            Err(Error::IndexOperation {
                statement: text,
                errors: outcome.errors,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{IndexDef, DEFAULT_PRIMARY_INDEX};
    use crate::store::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, IndexManager) {
        let store = Arc::new(MemoryStore::new("beer-sample"));
        let manager = IndexManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn test_render_statements() {
        let create = IndexStatement::CreateSecondary {
            store: "beer-sample".to_string(),
            name: "idx".to_string(),
            target_field: "_class".to_string(),
            additional_fields: vec!["f1".to_string(), "f2".to_string()],
            filter_value: "com.acme.Foo".to_string(),
        };
        assert_eq!(
            create.to_string(),
            "CREATE INDEX idx ON `beer-sample`(_class,f1,f2) WHERE _class = \"com.acme.Foo\""
        );

        let primary = IndexStatement::CreatePrimary { store: "b".to_string(), name: None };
        assert_eq!(primary.to_string(), "CREATE PRIMARY INDEX ON `b`");

        let named = IndexStatement::CreatePrimary {
            store: "b".to_string(),
            name: Some("my-index".to_string()),
        };
        assert_eq!(named.to_string(), "CREATE PRIMARY INDEX `my-index` ON `b`");

        let drop = IndexStatement::DropPrimary { store: "b".to_string(), name: None };
        assert_eq!(drop.to_string(), "DROP PRIMARY INDEX ON `b`");

        let drop = IndexStatement::DropSecondary { store: "b".to_string(), name: "idx".to_string() };
        assert_eq!(drop.to_string(), "DROP INDEX `b`.idx");
    }

    #[test]
    fn test_primary_index_lifecycle() {
        let (store, manager) = manager();

        manager.create_primary_index(None).unwrap();
        assert_eq!(store.index(DEFAULT_PRIMARY_INDEX), Some(IndexDef::Primary));

        let err = manager.create_primary_index(None).unwrap_err();
        match err {
            Error::IndexOperation { statement, errors } => {
                assert_eq!(statement, "CREATE PRIMARY INDEX ON `beer-sample`");
                assert_eq!(errors, vec!["Index #primary already exists"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        manager.drop_primary_index(None).unwrap();
        assert!(store.index_names().is_empty());
        assert!(manager.drop_primary_index(None).is_err());
    }

    #[test]
    fn test_named_primary_index_lifecycle() {
        let (store, manager) = manager();

        manager.create_primary_index(Some("monIndex")).unwrap();
        assert_eq!(store.index_names(), vec!["monIndex"]);

        manager.drop_primary_index(Some("monIndex")).unwrap();
        assert_eq!(store.last_statement().unwrap(), "DROP INDEX `beer-sample`.monIndex");
        assert!(store.index_names().is_empty());
    }

    #[test]
    fn test_secondary_index_preserves_field_order() {
        let (store, manager) = manager();

        manager
            .create_secondary_index("idx", "com.acme.Foo", "_class", &["f1", "f2"])
            .unwrap();

        assert_eq!(
            store.last_statement().unwrap(),
            "CREATE INDEX idx ON `beer-sample`(_class,f1,f2) WHERE _class = \"com.acme.Foo\""
        );
        match store.index("idx") {
            Some(IndexDef::Secondary { fields, filter }) => {
                assert_eq!(fields, vec!["_class", "f1", "f2"]);
                assert_eq!(filter.unwrap().value, "com.acme.Foo");
            }
            other => panic!("unexpected index: {:?}", other),
        }

        let none: [&str; 0] = [];
        manager.create_secondary_index("plain", "com.acme.Bar", "_class", &none).unwrap();
        assert_eq!(
            store.last_statement().unwrap(),
            "CREATE INDEX plain ON `beer-sample`(_class) WHERE _class = \"com.acme.Bar\""
        );

        manager.drop_secondary_index("idx").unwrap();
        assert_eq!(store.index_names(), vec!["plain"]);

        let err = manager.drop_secondary_index("idx").unwrap_err();
        assert!(matches!(err, Error::IndexOperation { .. }));
    }

    #[test]
    fn test_index_spec_validation() {
        assert!(IndexSpec::primary(None).validate().is_ok());
        assert!(IndexSpec::secondary("i", "v", "f", vec![]).validate().is_ok());

        let missing_filter = IndexSpec {
            name: Some("i".to_string()),
            target_field: Some("f".to_string()),
            ..IndexSpec::default()
        };
        assert!(matches!(missing_filter.validate(), Err(Error::InvalidArgument(_))));

        let unnamed = IndexSpec {
            name: None,
            ..IndexSpec::secondary("i", "v", "f", vec![])
        };
        assert!(matches!(unnamed.validate(), Err(Error::InvalidArgument(_))));

        let primary_with_fields = IndexSpec {
            additional_fields: vec!["x".to_string()],
            ..IndexSpec::primary(None)
        };
        assert!(primary_with_fields.validate().is_err());
    }

    #[test]
    fn test_create_index_from_spec() {
        let (store, manager) = manager();

        manager.create_index(&IndexSpec::primary(Some("p"))).unwrap();
        manager
            .create_index(&IndexSpec::secondary("s", "com.acme.Foo", "_class", vec!["name".to_string()]))
            .unwrap();

        assert_eq!(store.index_names(), vec!["p", "s"]);
    }
}
