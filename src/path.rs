//! Reference paths - Dotted field paths into document bodies
//!
//! Format: `field.sub.field` with optional numeric segments for array
//! positions (`links.0`). A leading `$.` root marker is accepted.
//!
//! Examples:
//! - `brewery_id` resolves to a single key
//! - `subtype.links` resolves to an array of keys
//! - `items.sku` projects `sku` out of every element of the `items` array

use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Immutable path expression evaluated against a document body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencePath {
    segments: Vec<String>,
}

impl ReferencePath {
    /// Parse a dotted path expression
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let trimmed = trimmed
            .strip_prefix("$.")
            .unwrap_or(trimmed);

        if trimmed.is_empty() || trimmed == "$" {
            return Err(Error::PathResolution("Path must not be empty".to_string()));
        }

        let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::PathResolution(format!(
                "Path contains an empty segment: {}",
                path
            )));
        }

        Ok(Self { segments })
    }

    /// Path segments in evaluation order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for ReferencePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Keys found at a reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedKeys {
    One(String),
    Many(Vec<String>),
}

impl ExtractedKeys {
    /// Normalize to an ordered sequence; a single key becomes a one-element list
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ExtractedKeys::One(key) => vec![key],
            ExtractedKeys::Many(keys) => keys,
        }
    }
}

/// Extracts foreign keys from a document body.
///
/// Implementations must be pure: the same body and path always produce the
/// same result, and a path that does not resolve is an error.
pub trait PathExtractor: Send + Sync {
    fn extract(&self, body: &Value, path: &ReferencePath) -> Result<ExtractedKeys>;
}

/// Default extractor walking dotted segments through objects and arrays.
///
/// A numeric segment indexes into an array; any other segment applied to an
/// array is projected over each element.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedPathExtractor;

impl PathExtractor for DottedPathExtractor {
    fn extract(&self, body: &Value, path: &ReferencePath) -> Result<ExtractedKeys> {
        let mut nodes = vec![body];
        let mut projected = false;

        for segment in path.segments() {
            let mut next = Vec::with_capacity(nodes.len());
            for node in nodes {
                match node {
                    Value::Object(map) => {
                        let child = map.get(segment).ok_or_else(|| {
                            Error::PathResolution(format!(
                                "No field '{}' while resolving '{}'",
                                segment, path
                            ))
                        })?;
                        next.push(child);
                    }
                    Value::Array(items) => match segment.parse::<usize>() {
                        Ok(idx) => {
                            let child = items.get(idx).ok_or_else(|| {
                                Error::PathResolution(format!(
                                    "Index {} out of bounds while resolving '{}'",
                                    idx, path
                                ))
                            })?;
                            next.push(child);
                        }
                        Err(_) => {
                            projected = true;
                            for item in items {
                                let child = item.get(segment.as_str()).ok_or_else(|| {
                                    Error::PathResolution(format!(
                                        "Array element has no field '{}' while resolving '{}'",
                                        segment, path
                                    ))
                                })?;
                                next.push(child);
                            }
                        }
                    },
                    other => {
                        return Err(Error::PathResolution(format!(
                            "Cannot descend into {} at '{}' while resolving '{}'",
                            kind_of(other),
                            segment,
                            path
                        )));
                    }
                }
            }
            nodes = next;
        }

        if !projected {
            if let [single] = nodes.as_slice() {
                return match single {
                    Value::String(key) => Ok(ExtractedKeys::One(key.clone())),
                    Value::Array(items) => Ok(ExtractedKeys::Many(strings(items.iter(), path)?)),
                    other => Err(not_a_key(other, path)),
                };
            }
        }

        Ok(ExtractedKeys::Many(strings(nodes.into_iter(), path)?))
    }
}

fn strings<'a>(values: impl Iterator<Item = &'a Value>, path: &ReferencePath) -> Result<Vec<String>> {
    values
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            other => Err(not_a_key(other, path)),
        })
        .collect()
}

fn not_a_key(value: &Value, path: &ReferencePath) -> Error {
    Error::PathResolution(format!(
        "Expected a string key at '{}', found {}",
        path,
        kind_of(value)
    ))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
