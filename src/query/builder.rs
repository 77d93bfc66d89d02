//! N1QL query builder
//!
//! Holds at most one pending statement (last write wins) and executes it
//! against the store. The blocking methods here are the async core in
//! `AsyncQuery` driven to completion, so both modes return the same rows.

use super::async_query::{self, AsyncQuery};
use crate::document::Row;
use crate::index::IndexManager;
use crate::runtime;
use crate::statement::{self, QueryStatement, Statement, DEFAULT_PLACEHOLDER};
use crate::store::Store;
use crate::Result;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A document type stored with a `_class` discriminator field.
pub trait Entity {
    /// Value of the `_class` field for documents of this type
    const CLASS: &'static str;
}

/// Query builder bound to one store
pub struct N1ql {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) placeholder: String,
    pub(crate) statement: Option<QueryStatement>,
}

impl N1ql {
    /// Create a builder for `store`
    pub fn with(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            statement: None,
        }
    }

    /// Use another placeholder token for the store identifier
    pub fn placeholder(mut self, token: impl Into<String>) -> Self {
        self.placeholder = token.into();
        self
    }

    /// Set a raw statement, substituting the store placeholder
    pub fn query(&mut self, text: &str) -> &mut Self {
        self.statement = Some(QueryStatement::text(text, &self.placeholder, self.store.name()));
        self
    }

    /// Set a pre-built statement, used as-is
    pub fn query_statement(&mut self, statement: impl Statement + 'static) -> &mut Self {
        self.statement = Some(QueryStatement::structured(statement));
        self
    }

    /// Select `fields` from every document whose `_class` is `type_name`.
    ///
    /// An empty field list produces an empty projection.
    pub fn query_entity<S: AsRef<str>>(&mut self, type_name: &str, fields: &[S]) -> &mut Self {
        let text = statement::entity_query(type_name, fields, &self.placeholder);
        self.query(&text)
    }

    /// `query_entity` with the class name declared by `E`
    pub fn query_entity_of<E: Entity, S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        self.query_entity(E::CLASS, fields)
    }

    /// The pending statement, if any
    pub fn statement(&self) -> Option<&QueryStatement> {
        self.statement.as_ref()
    }

    /// Switch to the non-blocking API; statements set there land here too
    pub fn async_query(&mut self) -> AsyncQuery<'_> {
        AsyncQuery::new(self)
    }

    /// Index management against the same store
    pub fn indexes(&self) -> IndexManager {
        IndexManager::new(self.store.clone())
    }

    /// Run the pending statement and collect every row, in delivery order
    pub fn execute(&self) -> Result<Vec<Row>> {
        runtime::block_on(async_query::rows(self).try_collect())?
    }

    /// Run the pending statement and map every row with `mapper`.
    ///
    /// The first row that fails to map aborts the whole call.
    pub fn execute_and_map<T, E, F>(&self, mapper: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnMut(Row) -> std::result::Result<T, E> + Send + 'static,
    {
        runtime::block_on(async_query::mapped(self, mapper).try_collect())?
    }

    /// Run the pending statement and deserialize every row into `T`
    pub fn execute_as<T>(&self) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute_and_map(async_query::deserialize::<T>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexStatement;
    use crate::store::MemoryStore;
    use crate::Error;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Beer {
        name: String,
        abv: f64,
    }

    impl Entity for Beer {
        const CLASS: &'static str = "com.acme.Beer";
    }

    fn sample_store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new("beer-sample")
                .with_document("beer-1", json!({ "_class": "com.acme.Beer", "name": "Brune", "abv": 6.5 }))
                .with_document("beer-2", json!({ "_class": "com.acme.Beer", "name": "Blonde", "abv": 6.6 }))
                .with_document("beer-3", json!({ "_class": "com.acme.Beer", "name": "Triple", "abv": 8.5 }))
                .with_document("brewery-1", json!({ "_class": "com.acme.Brewery", "name": "Leffe" })),
        )
    }

    fn indexed_store() -> Arc<MemoryStore> {
        let store = sample_store();
        N1ql::with(store.clone()).indexes().create_primary_index(None).unwrap();
        store
    }

    #[test]
    fn test_query_substitutes_placeholder() {
        let store = indexed_store();
        let mut n1ql = N1ql::with(store.clone());

        n1ql.query("select * from %store%");
        assert_eq!(n1ql.statement().unwrap().render(), "select * from `beer-sample`");

        let rows = n1ql.execute().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(store.last_statement().unwrap(), "select * from `beer-sample`");
    }

    #[test]
    fn test_custom_placeholder() {
        let store = indexed_store();
        let mut n1ql = N1ql::with(store).placeholder("%bucket%");

        n1ql.query("select * from %bucket%");
        assert_eq!(n1ql.statement().unwrap().render(), "select * from `beer-sample`");
    }

    #[test]
    fn test_last_query_wins() {
        let store = indexed_store();
        let mut n1ql = N1ql::with(store);

        n1ql.query("select * from %store%")
            .query_entity("com.acme.Brewery", &["name"]);

        let rows = n1ql.execute().unwrap();
        assert_eq!(rows, vec![json!({ "name": "Leffe" }).as_object().unwrap().clone()]);
    }

    #[test]
    fn test_query_entity_statement() {
        let store = indexed_store();
        let mut n1ql = N1ql::with(store);

        n1ql.query_entity("com.acme.Foo", &["f1", "f2"]);
        assert_eq!(
            n1ql.statement().unwrap().render(),
            "SELECT f1,f2 FROM `beer-sample` WHERE `_class`=\"com.acme.Foo\""
        );

        n1ql.query_entity_of::<Beer, _>(&["name"]);
        assert_eq!(
            n1ql.statement().unwrap().render(),
            "SELECT name FROM `beer-sample` WHERE `_class`=\"com.acme.Beer\""
        );
    }

    #[test]
    fn test_execute_without_statement() {
        let store = indexed_store();
        let err = N1ql::with(store).execute().unwrap_err();
        assert!(matches!(err, Error::NoStatementSet));
    }

    #[test]
    fn test_store_errors_surface() {
        let store = sample_store();

        // No index yet
        let err = N1ql::with(store.clone()).query("select * from %store%").execute().unwrap_err();
        assert!(matches!(err, Error::StoreQuery(_)));

        let err = N1ql::with(store).query("not a statement").execute().unwrap_err();
        assert!(matches!(err, Error::StoreQuery(_)));
    }

    #[test]
    fn test_execute_as_maps_in_row_order() {
        let store = indexed_store();

        let beers: Vec<Beer> = N1ql::with(store.clone())
            .query_entity_of::<Beer, _>(&["name", "abv"])
            .execute_as()
            .unwrap();
        let rows = N1ql::with(store).query_entity_of::<Beer, _>(&["name", "abv"]).execute().unwrap();

        assert_eq!(beers.len(), rows.len());
        let names: Vec<_> = beers.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Brune", "Blonde", "Triple"]);
        assert_eq!(beers[2], Beer { name: "Triple".to_string(), abv: 8.5 });
    }

    #[test]
    fn test_mapping_failure_aborts() {
        let store = indexed_store();

        let err = N1ql::with(store.clone())
            .query_entity("com.acme.Brewery", &["name"])
            .execute_as::<Beer>()
            .unwrap_err();
        assert!(matches!(err, Error::Mapping { index: 0, .. }));

        let err = N1ql::with(store)
            .query_entity("com.acme.Beer", &["name"])
            .execute_and_map(|row| {
                let name = row["name"].as_str().unwrap_or_default().to_string();
                if name == "Blonde" {
                    Err(format!("refusing {}", name))
                } else {
                    Ok(name)
                }
            })
            .unwrap_err();
        assert!(matches!(err, Error::Mapping { index: 1, .. }));
    }

    #[test]
    fn test_structured_statement_passes_through() {
        let store = sample_store();

        N1ql::with(store.clone())
            .query_statement(IndexStatement::CreateSecondary {
                store: store.name().to_string(),
                name: "by_class".to_string(),
                target_field: "_class".to_string(),
                additional_fields: vec!["name".to_string(), "abv".to_string()],
                filter_value: "com.acme.Beer".to_string(),
            })
            .execute()
            .unwrap();

        assert_eq!(
            store.last_statement().unwrap(),
            "CREATE INDEX by_class ON `beer-sample`(_class,name,abv) WHERE _class = \"com.acme.Beer\""
        );
        assert_eq!(store.index_names(), vec!["by_class"]);

        // The covering index now serves the entity query
        let rows = N1ql::with(store).query_entity("com.acme.Beer", &["name"]).execute().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_inside_runtime() {
        let store = indexed_store();
        let rows = N1ql::with(store).query("select * from %store%").execute().unwrap();
        assert_eq!(rows.len(), 4);
    }
}
