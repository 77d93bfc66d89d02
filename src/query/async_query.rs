//! Non-blocking query API
//!
//! This is the single dispatch path: the blocking `N1ql::execute*` methods
//! collect these streams. Errors arrive as the last item of the stream.

use super::builder::N1ql;
use crate::document::Row;
use crate::runtime::until_first_error;
use crate::statement::Statement;
use crate::store::RowStream;
use crate::{Error, Result};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Async view over an `N1ql` builder.
///
/// Statements set here replace the builder's pending statement.
pub struct AsyncQuery<'a> {
    builder: &'a mut N1ql,
}

impl<'a> AsyncQuery<'a> {
    pub(crate) fn new(builder: &'a mut N1ql) -> Self {
        Self { builder }
    }

    /// Set a raw statement, substituting the store placeholder
    pub fn query(self, text: &str) -> Self {
        self.builder.query(text);
        self
    }

    /// Set a pre-built statement, used as-is
    pub fn query_statement(self, statement: impl Statement + 'static) -> Self {
        self.builder.query_statement(statement);
        self
    }

    /// Select `fields` from every document whose `_class` is `type_name`
    pub fn query_entity<S: AsRef<str>>(self, type_name: &str, fields: &[S]) -> Self {
        self.builder.query_entity(type_name, fields);
        self
    }

    /// Stream the rows of the pending statement
    pub fn execute(&self) -> RowStream {
        rows(self.builder)
    }

    /// Stream rows mapped with `mapper`; a mapping failure ends the stream
    pub fn execute_and_map<T, E, F>(&self, mapper: F) -> BoxStream<'static, Result<T>>
    where
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnMut(Row) -> std::result::Result<T, E> + Send + 'static,
    {
        mapped(self.builder, mapper)
    }

    /// Stream rows deserialized into `T`
    pub fn execute_as<T>(&self) -> BoxStream<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        mapped(self.builder, deserialize::<T>)
    }
}

pub(crate) fn rows(builder: &N1ql) -> RowStream {
    let store = builder.store.clone();
    let statement = builder.statement.as_ref().map(|s| s.render());

    let dispatch = async move {
        let statement = statement.ok_or(Error::NoStatementSet)?;
        tracing::debug!("Executing query: {}", statement);
        let rows = store.query(&statement).await.map_err(|e| {
            tracing::warn!("Query failed: {}", e);
            store_query_error(e)
        })?;
        // Errors reported after the first rows are still store errors
        Ok::<RowStream, Error>(rows
            .map_err(|e| {
                tracing::warn!("Query failed while streaming rows: {}", e);
                store_query_error(e)
            })
            .boxed())
    };

    until_first_error(stream::once(dispatch).try_flatten().boxed())
}

fn store_query_error(e: Error) -> Error {
    match e {
        Error::StoreQuery(errors) => Error::StoreQuery(errors),
        other => Error::StoreQuery(vec![other.to_string()]),
    }
}

pub(crate) fn mapped<T, E, F>(builder: &N1ql, mut mapper: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: FnMut(Row) -> std::result::Result<T, E> + Send + 'static,
{
    let mapped = rows(builder).enumerate().map(move |(index, row)| {
        row.and_then(|row| {
            mapper(row).map_err(|e| Error::Mapping {
                index,
                source: e.into(),
            })
        })
    });

    until_first_error(mapped.boxed())
}

pub(crate) fn deserialize<T: DeserializeOwned>(row: Row) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(row))
}
