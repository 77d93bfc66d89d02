//! Joint - Cross-document reference resolution
//!
//! Follows a foreign-key path inside one or more root documents and fetches
//! every referenced document concurrently.
//!
//! ```ignore
//! let docs = Joint::with(store)
//!     .from(["abbaye_de_leffe-brune_brown"])
//!     .to("subtype.links")
//!     .execute(true);
//! ```
//!
//! Stages are distinct types, so `from` must come before `to` and `to`
//! before `execute`.
//!
//! Resolution order:
//! 1. Fetch all roots concurrently; any missing root fails the resolution
//!    before a single document is yielded
//! 2. Extract foreign keys from every root body
//! 3. Fetch every foreign key concurrently and merge in the roots if asked
//!
//! The first error ends the stream. Dropping the stream, or reaching that
//! error, drops every in-flight fetch.

use crate::document::Document;
use crate::path::{DottedPathExtractor, PathExtractor, ReferencePath};
use crate::runtime::until_first_error;
use crate::store::Store;
use crate::{Error, Result};
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Entry point of the staged builder
pub struct Joint;

impl Joint {
    /// Start a resolution against `store` using the dotted path extractor
    pub fn with(store: Arc<dyn Store>) -> JointFrom {
        JointFrom {
            store,
            extractor: Arc::new(DottedPathExtractor),
        }
    }
}

/// First stage: choose the root documents
pub struct JointFrom {
    store: Arc<dyn Store>,
    extractor: Arc<dyn PathExtractor>,
}

impl JointFrom {
    /// Replace the path extractor
    pub fn extractor(mut self, extractor: Arc<dyn PathExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Root document keys, processed in order but fetched concurrently
    pub fn from<I, K>(self, keys: I) -> JointTo
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        JointTo {
            store: self.store,
            extractor: self.extractor,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Second stage: choose the reference path
pub struct JointTo {
    store: Arc<dyn Store>,
    extractor: Arc<dyn PathExtractor>,
    keys: Vec<String>,
}

impl JointTo {
    /// Path to the foreign keys; parse errors surface on execution
    pub fn to(self, path: &str) -> JointRun {
        self.run(ReferencePath::parse(path))
    }

    /// Same as `to` with an already parsed path
    pub fn to_path(self, path: ReferencePath) -> JointRun {
        self.run(Ok(path))
    }

    fn run(self, path: Result<ReferencePath>) -> JointRun {
        JointRun {
            store: self.store,
            extractor: self.extractor,
            keys: self.keys,
            path,
            dedup: false,
        }
    }
}

/// Final stage: run the resolution
pub struct JointRun {
    store: Arc<dyn Store>,
    extractor: Arc<dyn PathExtractor>,
    keys: Vec<String>,
    path: Result<ReferencePath>,
    dedup: bool,
}

impl JointRun {
    /// Skip foreign keys already requested by this resolution.
    ///
    /// Off by default: two roots referencing the same key yield that
    /// document twice.
    pub fn dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Stream the referenced documents, plus the roots when `include_root`.
    ///
    /// Nothing is fetched until the stream is polled. No ordering is
    /// guaranteed between documents.
    pub fn execute(self, include_root: bool) -> BoxStream<'static, Result<Document>> {
        let merged = stream::once(self.prepare(include_root)).try_flatten();
        until_first_error(merged.boxed())
    }

    /// Drive `execute` to completion
    pub async fn collect(self, include_root: bool) -> Result<Vec<Document>> {
        self.execute(include_root).try_collect().await
    }

    async fn prepare(self, include_root: bool) -> Result<BoxStream<'static, Result<Document>>> {
        let JointRun {
            store,
            extractor,
            keys,
            path,
            dedup,
        } = self;

        let path = path?;
        if keys.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one root key is required".to_string(),
            ));
        }

        tracing::debug!("Resolving {} via {} root(s)", path, keys.len());

        let fetches: Vec<_> = keys
            .iter()
            .map(|key| fetch_root(store.as_ref(), key))
            .collect();
        let roots = future::try_join_all(fetches).await?;

        let mut foreign_keys = Vec::new();
        for root in &roots {
            let referenced = extractor.extract(&root.body, &path)?.into_vec();
            tracing::debug!("{} references {} document(s)", root.key, referenced.len());
            foreign_keys.extend(referenced);
        }

        if dedup {
            let mut seen = HashSet::new();
            foreign_keys.retain(|key| seen.insert(key.clone()));
        }

        let fan_out = foreign_keys.len().max(1);
        let foreign = stream::iter(foreign_keys)
            .map(move |key| {
                let store = store.clone();
                async move { fetch_foreign(store.as_ref(), key).await }
            })
            .buffer_unordered(fan_out);

        if include_root {
            let roots = stream::iter(roots.into_iter().map(Ok));
            Ok(stream::select(foreign, roots).boxed())
        } else {
            Ok(foreign.boxed())
        }
    }
}

async fn fetch_root(store: &dyn Store, key: &str) -> Result<Document> {
    store.get(key).await.map_err(|e| {
        if e.is_not_found() {
            Error::ReferenceNotFound(key.to_string())
        } else {
            Error::Fetch {
                key: key.to_string(),
                source: Box::new(e),
            }
        }
    })
}

async fn fetch_foreign(store: &dyn Store, key: String) -> Result<Document> {
    match store.get(&key).await {
        Ok(doc) => Ok(doc),
        Err(e) => {
            tracing::warn!("Failed to fetch referenced document {}: {}", key, e);
            Err(Error::Fetch {
                key,
                source: Box::new(e),
            })
        }
    }
}
