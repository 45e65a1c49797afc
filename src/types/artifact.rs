//! Downloaded job artifacts.

use serde_json::Value;

/// Decoded contents of a report or snapshot file.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// JSON document, integers kept exact.
    Json(Value),
    /// Non-JSON content decoded as UTF-8.
    Text(String),
}

impl Artifact {
    /// Returns the JSON value, if this artifact is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Artifact::Json(value) => Some(value),
            Artifact::Text(_) => None,
        }
    }

    /// Returns the text, if this artifact is not JSON.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Text(text) => Some(text),
            Artifact::Json(_) => None,
        }
    }

    /// Consumes the artifact, returning a JSON value. Text becomes a JSON string.
    pub fn into_json(self) -> Value {
        match self {
            Artifact::Json(value) => value,
            Artifact::Text(text) => Value::String(text),
        }
    }

    /// Number of records, when the artifact is a JSON array.
    pub fn record_count(&self) -> Option<usize> {
        self.as_json().and_then(Value::as_array).map(Vec::len)
    }
}
