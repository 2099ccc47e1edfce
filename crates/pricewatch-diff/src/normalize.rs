//! Canonical field values.
//!
//! Every field is reduced to a [`FieldValue`] before comparison so that
//! presentation noise (whitespace, list order, empty stand-ins for missing
//! structured data) never registers as a change.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// A normalized field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Absent, null, or empty
    Missing,
    /// Whitespace-collapsed, non-empty text
    Text(String),
    /// A number
    Number(f64),
    /// A non-empty set of strings
    List(BTreeSet<String>),
    /// Non-empty JSON
    Structured(JsonValue),
}

impl FieldValue {
    /// Whether the value is [`FieldValue::Missing`].
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The numeric value, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text from an optional string: trimmed, inner whitespace collapsed to
    /// single spaces, empty treated as missing.
    pub fn text(value: Option<&str>) -> Self {
        let collapsed = value
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if collapsed.is_empty() {
            Self::Missing
        } else {
            Self::Text(collapsed)
        }
    }

    /// A number from an optional float.
    pub fn number(value: Option<f64>) -> Self {
        value.filter(|n| n.is_finite()).map_or(Self::Missing, Self::Number)
    }

    /// A number from an optional count.
    #[allow(clippy::cast_precision_loss)]
    pub fn count(value: Option<u64>) -> Self {
        value.map_or(Self::Missing, |n| Self::Number(n as f64))
    }

    /// A flag as 1/0.
    pub fn flag(value: Option<bool>) -> Self {
        value.map_or(Self::Missing, |b| Self::Number(if b { 1.0 } else { 0.0 }))
    }

    /// An order-independent set of trimmed, non-empty strings.
    pub fn list(values: &[String]) -> Self {
        let set: BTreeSet<String> = values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if set.is_empty() {
            Self::Missing
        } else {
            Self::List(set)
        }
    }

    /// Structured JSON with empty stand-ins folded to missing.
    pub fn structured(value: Option<&JsonValue>) -> Self {
        match value {
            Some(v) if !is_empty_structure(v) => Self::Structured(v.clone()),
            _ => Self::Missing,
        }
    }
}

/// Null, blank strings, `{}`, `[]`, and an object whose only key holds an
/// empty value all count as empty.
pub fn is_empty_structure(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => match map.len() {
            0 => true,
            1 => map.values().all(is_empty_leaf),
            _ => false,
        },
        JsonValue::Bool(_) | JsonValue::Number(_) => false,
    }
}

fn is_empty_leaf(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        JsonValue::Bool(_) | JsonValue::Number(_) => false,
    }
}
