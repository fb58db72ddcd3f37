//! Attribute references and the values recorded against them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to an attribute in the backing store.
///
/// Equality and hashing use both fields, but overlap checks compare `id` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// Store-wide unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl AttributeRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Reference whose display name is the last `|`-separated segment of its path.
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('|').next().unwrap_or(path);
        Self::new(path, name)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A single scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view, used by aggregate rules.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A value as it was recorded in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedValue {
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

/// A time-series value addressed to a destination attribute.
///
/// Rules produce these with `attribute` unset; the publisher binds the
/// destination from the resolved output before writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesValue {
    pub timestamp: DateTime<Utc>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<AttributeRef>,
}

impl TimeSeriesValue {
    pub fn new(timestamp: DateTime<Utc>, value: Value) -> Self {
        Self {
            timestamp,
            value,
            attribute: None,
        }
    }

    /// Return a copy bound to `attribute`.
    pub fn bound_to(mut self, attribute: AttributeRef) -> Self {
        self.attribute = Some(attribute);
        self
    }
}

impl fmt::Display for TimeSeriesValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp)
    }
}
