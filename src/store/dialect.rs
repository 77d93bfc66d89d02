//! Statement dialect understood by `MemoryStore`
//!
//! Covers the subset of N1QL this crate emits:
//! - SELECT * | f1,f2 FROM `ks` [WHERE `field` = "value"]
//! - CREATE PRIMARY INDEX [name] ON `ks` [USING GSI]
//! - DROP PRIMARY INDEX ON `ks` [USING GSI]
//! - CREATE INDEX name ON `ks`(f1,f2) [WHERE f1 = "value"] [USING GSI]
//! - DROP INDEX `ks`.name [USING GSI]

use crate::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Identifier: backtick-quoted (`` doubles a backtick) or bare
const IDENT: &str = r"(?:`(?:[^`]|``)+`|[A-Za-z_][A-Za-z0-9_]*)";
/// Double or single quoted string literal
const LITERAL: &str = r#"(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')"#;
const TAIL: &str = r"(?:\s+USING\s+GSI)?\s*;?\s*$";

/// A filter of the form `field = "value"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Fields(Vec<String>),
}

/// A statement recognized by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStatement {
    Select {
        projection: Projection,
        keyspace: String,
        filter: Option<Filter>,
    },
    CreatePrimaryIndex {
        name: Option<String>,
        keyspace: String,
    },
    DropPrimaryIndex {
        keyspace: String,
    },
    CreateIndex {
        name: String,
        keyspace: String,
        fields: Vec<String>,
        filter: Option<Filter>,
    },
    DropIndex {
        keyspace: String,
        name: String,
    },
}

impl ParsedStatement {
    /// DDL statements change index state; everything else reads documents
    pub fn is_ddl(&self) -> bool {
        !matches!(self, ParsedStatement::Select { .. })
    }
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?is)^\s*SELECT\s+(?P<proj>.*?)\s+FROM\s+(?P<ks>{IDENT})(?:\s+WHERE\s+(?P<field>{IDENT})\s*=\s*(?P<value>{LITERAL}))?\s*;?\s*$"
        ))
        .expect("select pattern")
    })
}

fn create_primary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?is)^\s*CREATE\s+PRIMARY\s+INDEX\s+(?:(?P<name>{IDENT})\s+)?ON\s+(?P<ks>{IDENT}){TAIL}"
        ))
        .expect("create primary pattern")
    })
}

fn drop_primary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?is)^\s*DROP\s+PRIMARY\s+INDEX\s+ON\s+(?P<ks>{IDENT}){TAIL}"
        ))
        .expect("drop primary pattern")
    })
}

fn create_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?is)^\s*CREATE\s+INDEX\s+(?P<name>{IDENT})\s+ON\s+(?P<ks>{IDENT})\s*\((?P<fields>[^)]*)\)(?:\s+WHERE\s+\(?\s*(?P<field>{IDENT})\s*=\s*(?P<value>{LITERAL})\s*\)?)?{TAIL}"
        ))
        .expect("create index pattern")
    })
}

fn drop_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?is)^\s*DROP\s+INDEX\s+(?P<ks>{IDENT})\.(?P<name>{IDENT}){TAIL}"
        ))
        .expect("drop index pattern")
    })
}

/// Parse a statement, failing with the store's syntax error message
pub fn parse(statement: &str) -> Result<ParsedStatement> {
    if let Some(caps) = create_primary_re().captures(statement) {
        return Ok(ParsedStatement::CreatePrimaryIndex {
            name: caps.name("name").map(|m| unquote(m.as_str())),
            keyspace: unquote(&caps["ks"]),
        });
    }

    if let Some(caps) = drop_primary_re().captures(statement) {
        return Ok(ParsedStatement::DropPrimaryIndex {
            keyspace: unquote(&caps["ks"]),
        });
    }

    if let Some(caps) = create_index_re().captures(statement) {
        let fields = split_fields(&caps["fields"]);
        if fields.is_empty() {
            return Err(syntax_error(statement, "index must list at least one field"));
        }
        return Ok(ParsedStatement::CreateIndex {
            name: unquote(&caps["name"]),
            keyspace: unquote(&caps["ks"]),
            fields,
            filter: filter(&caps),
        });
    }

    if let Some(caps) = drop_index_re().captures(statement) {
        return Ok(ParsedStatement::DropIndex {
            keyspace: unquote(&caps["ks"]),
            name: unquote(&caps["name"]),
        });
    }

    if let Some(caps) = select_re().captures(statement) {
        let proj = caps["proj"].trim();
        let projection = if proj == "*" {
            Projection::All
        } else {
            let fields = split_fields(proj);
            if fields.is_empty() {
                return Err(syntax_error(statement, "empty projection"));
            }
            Projection::Fields(fields)
        };
        return Ok(ParsedStatement::Select {
            projection,
            keyspace: unquote(&caps["ks"]),
            filter: filter(&caps),
        });
    }

    Err(syntax_error(statement, "unsupported statement"))
}

fn filter(caps: &regex::Captures<'_>) -> Option<Filter> {
    match (caps.name("field"), caps.name("value")) {
        (Some(field), Some(value)) => Some(Filter {
            field: unquote(field.as_str()),
            value: unquote_literal(value.as_str()),
        }),
        _ => None,
    }
}

fn split_fields(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(unquote)
        .collect()
}

fn syntax_error(statement: &str, reason: &str) -> Error {
    Error::StoreQuery(vec![format!("syntax error ({}): {}", reason, statement)])
}

/// Strip backtick quoting from an identifier
pub fn unquote(ident: &str) -> String {
    match ident.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        Some(inner) => inner.replace("``", "`"),
        None => ident.to_string(),
    }
}

/// Strip quotes from a string literal and resolve escapes
pub fn unquote_literal(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let parsed = parse("SELECT f1,f2 FROM `beer-sample` WHERE `_class`=\"com.acme.Foo\"").unwrap();
        assert_eq!(
            parsed,
            ParsedStatement::Select {
                projection: Projection::Fields(vec!["f1".to_string(), "f2".to_string()]),
                keyspace: "beer-sample".to_string(),
                filter: Some(Filter {
                    field: "_class".to_string(),
                    value: "com.acme.Foo".to_string(),
                }),
            }
        );

        let parsed = parse("select * from `beer-sample`").unwrap();
        assert!(matches!(parsed, ParsedStatement::Select { projection: Projection::All, filter: None, .. }));
    }

    #[test]
    fn test_parse_ddl() {
        assert_eq!(
            parse("CREATE PRIMARY INDEX ON `beer-sample`").unwrap(),
            ParsedStatement::CreatePrimaryIndex { name: None, keyspace: "beer-sample".to_string() }
        );
        assert_eq!(
            parse("CREATE PRIMARY INDEX `my-idx` ON `b` USING GSI").unwrap(),
            ParsedStatement::CreatePrimaryIndex {
                name: Some("my-idx".to_string()),
                keyspace: "b".to_string()
            }
        );
        assert_eq!(
            parse("DROP PRIMARY INDEX ON `b`").unwrap(),
            ParsedStatement::DropPrimaryIndex { keyspace: "b".to_string() }
        );
        assert_eq!(
            parse("CREATE INDEX idx ON `b`(_class,f1,f2) WHERE _class = \"com.acme.Foo\"").unwrap(),
            ParsedStatement::CreateIndex {
                name: "idx".to_string(),
                keyspace: "b".to_string(),
                fields: vec!["_class".to_string(), "f1".to_string(), "f2".to_string()],
                filter: Some(Filter {
                    field: "_class".to_string(),
                    value: "com.acme.Foo".to_string(),
                }),
            }
        );
        assert_eq!(
            parse("DROP INDEX `b`.idx").unwrap(),
            ParsedStatement::DropIndex { keyspace: "b".to_string(), name: "idx".to_string() }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_empty_projection() {
        assert!(matches!(parse("UPSERT INTO b VALUES (1)"), Err(Error::StoreQuery(_))));
        assert!(matches!(
            parse("SELECT  FROM `b` WHERE `_class`=\"x\""),
            Err(Error::StoreQuery(_))
        ));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("`we``ird`"), "we`ird");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote_literal(r#""say \"hi\"""#), "say \"hi\"");
    }
}
