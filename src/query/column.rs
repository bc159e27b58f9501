// Column Metadata Module
//
// This module defines the Column type that describes one position of a
// query result.

use serde::{Serialize, Deserialize};

/// Name and engine-reported type of one result column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    name: String,
    /// Type tag reported by the engine, e.g. "TIMESTAMP" (empty when unknown)
    declared_type: String,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }

    /// Get the column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the declared type as reported by the engine
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// Declared type, or `None` if the engine did not report one
    pub fn type_hint(&self) -> Option<&str> {
        if self.declared_type.trim().is_empty() {
            None
        } else {
            Some(&self.declared_type)
        }
    }
}

/// Canonical form of an engine type name: trimmed, upper-cased, inner
/// whitespace collapsed and any parenthesised precision removed, so that
/// `" timestamp(3) "` and `"TIMESTAMP"` compare equal.
pub fn normalize_type_name(raw: &str) -> String {
    let base = match raw.find('(') {
        Some(open) => {
            let close = raw[open..].find(')').map(|i| open + i + 1).unwrap_or(raw.len());
            format!("{}{}", &raw[..open], &raw[close..])
        }
        None => raw.to_string(),
    };
    base.split_whitespace()
        .map(|word| word.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}
