//! Query statements and identifier quoting
//!
//! A `QueryStatement` is either raw text (placeholder already substituted)
//! or a pre-built `Statement` object rendered at dispatch time.

use std::fmt;
use std::sync::Arc;

/// Placeholder replaced by the quoted store identifier in raw query text
pub const DEFAULT_PLACEHOLDER: &str = "%store%";

/// A pre-built statement object.
///
/// Rendered with `Display` right before it is sent to the store.
pub trait Statement: fmt::Display + fmt::Debug + Send + Sync {}

/// The statement held by a query builder
#[derive(Debug, Clone)]
pub enum QueryStatement {
    /// Raw statement text
    Text(String),
    /// Structured statement passed through as-is
    Structured(Arc<dyn Statement>),
}

impl QueryStatement {
    /// Raw text with every placeholder occurrence replaced by the quoted store name
    pub fn text(raw: &str, placeholder: &str, store: &str) -> Self {
        QueryStatement::Text(substitute_placeholder(raw, placeholder, store))
    }

    /// Wrap a structured statement without any substitution
    pub fn structured(statement: impl Statement + 'static) -> Self {
        QueryStatement::Structured(Arc::new(statement))
    }

    /// Text sent to the store
    pub fn render(&self) -> String {
        match self {
            QueryStatement::Text(text) => text.clone(),
            QueryStatement::Structured(statement) => statement.to_string(),
        }
    }
}

impl fmt::Display for QueryStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatement::Text(text) => f.write_str(text),
            QueryStatement::Structured(statement) => write!(f, "{}", statement),
        }
    }
}

/// Replace every occurrence of `placeholder` with the backtick-quoted store name
pub fn substitute_placeholder(raw: &str, placeholder: &str, store: &str) -> String {
    if placeholder.is_empty() {
        return raw.to_string();
    }
    raw.replace(placeholder, &quote_identifier(store))
}

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Emit a name bare when it is a plain identifier, quoted otherwise
pub fn identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if plain {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// Double-quote a string literal, escaping backslashes and quotes
pub fn string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Projection list for entity queries; empty input gives an empty projection
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// `SELECT <fields> FROM <placeholder> WHERE `_class`="<type_name>"`
pub fn entity_query<S: AsRef<str>>(type_name: &str, fields: &[S], placeholder: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE `_class`={}",
        join_fields(fields),
        placeholder,
        string_literal(type_name)
    )
}
