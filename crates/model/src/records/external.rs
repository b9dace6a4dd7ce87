use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The untyped syntax family a connector speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalFormat {
    /// Delimited text: every field is a string.
    Text,
    /// JSON documents: fields are parsed JSON nodes.
    Json,
}

/// A raw field value as produced by (or handed to) a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExternalValue {
    /// The external null: an absent text field or a JSON `null`.
    Null,
    Text(String),
    Json(JsonValue),
}

impl ExternalValue {
    pub fn text(s: impl Into<String>) -> Self {
        ExternalValue::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExternalValue::Null | ExternalValue::Json(JsonValue::Null))
    }

    /// The textual content, when the value is text or a JSON string node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExternalValue::Text(s) => Some(s),
            ExternalValue::Json(JsonValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ExternalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalValue::Null => f.write_str("null"),
            ExternalValue::Text(s) => f.write_str(s),
            ExternalValue::Json(node) => write!(f, "{node}"),
        }
    }
}

impl fmt::Display for ExternalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalFormat::Text => f.write_str("text"),
            ExternalFormat::Json => f.write_str("json"),
        }
    }
}
