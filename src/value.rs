//! Property values - open key/value bags attached to nodes and relations
//!
//! Values are constrained to JSON scalars so they can be stored in a JSON
//! text column and compared with `json_extract` on the database side.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property bag: string keys to scalar values, ordered for stable output.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Null values and empty strings count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Parse a command-line literal: `true`/`false`, integers, floats, `null`,
    /// anything else is a string.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "null" => PropertyValue::Null,
            "true" => PropertyValue::Bool(true),
            "false" => PropertyValue::Bool(false),
            _ => {
                if let Ok(i) = raw.parse::<i64>() {
                    PropertyValue::Int(i)
                } else if let Ok(f) = raw.parse::<f64>() {
                    PropertyValue::Float(f)
                } else {
                    PropertyValue::String(raw.to_string())
                }
            }
        }
    }

    /// SQL value matching what `json_extract` yields for this scalar.
    ///
    /// JSON booleans come back from SQLite as integers 0/1.
    pub fn to_sql_value(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Integer(i64::from(*b)),
            PropertyValue::Int(i) => Value::Integer(*i),
            PropertyValue::Float(f) => Value::Real(*f),
            PropertyValue::String(s) => Value::Text(s.clone()),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// Drop keys whose value is null or an empty string.
///
/// Presentation cleanup applied before nodes and relations are handed back
/// to callers; storage keeps whatever was written.
pub fn remove_empty_values(properties: Properties) -> Properties {
    properties
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
}

/// Decode a JSON properties column. NULL or blank columns decode as empty.
pub(crate) fn decode_properties(raw: Option<&str>) -> crate::Result<Properties> {
    match raw {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(text)?),
        _ => Ok(Properties::new()),
    }
}
