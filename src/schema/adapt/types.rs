//! Core types and error definitions for value coercion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur while coercing a cell to its declared property type
///
/// Each variant carries the literal text that failed to convert.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoercionError {
    #[error("invalid integer value: '{0}'")]
    Integer(String),

    #[error("invalid number value: '{0}'")]
    Number(String),

    #[error("invalid boolean value: '{0}'")]
    Boolean(String),

    #[error("malformed date: '{0}'")]
    Date(String),

    #[error("malformed date-time: '{0}'")]
    DateTime(String),

    #[error("invalid JSON value: '{0}'")]
    Json(String),
}

impl CoercionError {
    /// The literal that failed to convert
    #[must_use]
    pub fn literal(&self) -> &str {
        match self {
            Self::Integer(s)
            | Self::Number(s)
            | Self::Boolean(s)
            | Self::Date(s)
            | Self::DateTime(s)
            | Self::Json(s) => s,
        }
    }
}

/// Alias for Result with `CoercionError`
pub type Result<T> = std::result::Result<T, CoercionError>;

/// The declared type of a (flattened) schema property
///
/// Coercion dispatches on this tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Integer,
    Number,
    Boolean,
    /// String with a fixed set of allowed values
    Enum { values: Vec<Value> },
    /// `format: date`
    Date,
    /// `format: date-time`
    DateTime,
    /// `linkTo` reference to an object of another type
    Ref { link_to: String },
    /// Object without declared properties
    Object,
    /// Unknown or untyped; values are kept as read
    Any,
}

impl PropertyKind {
    /// Derive the kind from a (non-array) property definition
    #[must_use]
    pub fn from_definition(definition: &Value) -> Self {
        if let Some(link_to) = definition.get("linkTo").and_then(Value::as_str) {
            return Self::Ref {
                link_to: link_to.to_string(),
            };
        }
        let type_name = match definition.get("type") {
            Some(Value::String(t)) => t.as_str(),
            // A list of types such as ["string", "null"] uses its first non-null entry
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .unwrap_or("any"),
            _ => "any",
        };
        match type_name {
            "string" => {
                if let Some(Value::Array(values)) = definition.get("enum") {
                    return Self::Enum {
                        values: values.clone(),
                    };
                }
                match definition.get("format").and_then(Value::as_str) {
                    Some("date") => Self::Date,
                    Some("date-time") => Self::DateTime,
                    _ => Self::String,
                }
            }
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            _ => Self::Any,
        }
    }

    /// Target type of a reference property
    #[must_use]
    pub fn link_to(&self) -> Option<&str> {
        match self {
            Self::Ref { link_to } => Some(link_to),
            _ => None,
        }
    }
}

/// Configuration for date format handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateFormatConfig {
    /// List of date format strings to try when parsing dates
    pub date_formats: Vec<String>,
    /// Format used when writing a parsed date back out
    pub default_format: String,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec!["%Y-%m-%d".to_string()],
            default_format: "%Y-%m-%d".to_string(),
        }
    }
}
