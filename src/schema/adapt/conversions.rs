//! Module for converting raw cell values to typed JSON values.

use serde_json::{Number, Value};

use crate::reader::CellValue;
use crate::schema::adapt::date_utils::{normalize_date, normalize_datetime};
use crate::schema::adapt::types::{CoercionError, DateFormatConfig, PropertyKind, Result};

/// Convert a cell to the JSON value for a property of the given kind
///
/// Structured (`Json`) cells from JSON or YAML inputs are taken as they are;
/// the validator reports a wrong type for those.
///
/// # Arguments
/// * `cell` - The raw cell value
/// * `kind` - The declared property kind
/// * `date_config` - Accepted date formats
///
/// # Returns
/// * `Result<Value>` - The typed value, or the literal that failed to convert
pub fn coerce_cell(cell: &CellValue, kind: &PropertyKind, date_config: &DateFormatConfig) -> Result<Value> {
    match cell {
        CellValue::Empty => Ok(Value::Null),
        CellValue::Json(value) => Ok(value.clone()),
        CellValue::String(text) => coerce_text(text, kind, date_config),
        CellValue::Integer(i) => match kind {
            PropertyKind::Integer | PropertyKind::Number | PropertyKind::Any => Ok(Value::from(*i)),
            PropertyKind::Boolean => Err(CoercionError::Boolean(i.to_string())),
            _ => coerce_text(&i.to_string(), kind, date_config),
        },
        CellValue::Float(f) => match kind {
            PropertyKind::Integer => float_to_integer(*f).ok_or_else(|| CoercionError::Integer(f.to_string())),
            PropertyKind::Number | PropertyKind::Any => {
                Number::from_f64(*f).map(Value::Number).ok_or_else(|| CoercionError::Number(f.to_string()))
            }
            PropertyKind::Boolean => Err(CoercionError::Boolean(f.to_string())),
            _ => coerce_text(&f.to_string(), kind, date_config),
        },
        CellValue::Boolean(b) => match kind {
            PropertyKind::Boolean | PropertyKind::Any => Ok(Value::Bool(*b)),
            PropertyKind::Integer => Err(CoercionError::Integer(b.to_string())),
            PropertyKind::Number => Err(CoercionError::Number(b.to_string())),
            _ => coerce_text(&b.to_string(), kind, date_config),
        },
    }
}

/// Convert cell text to the JSON value for a property of the given kind
pub fn coerce_text(text: &str, kind: &PropertyKind, date_config: &DateFormatConfig) -> Result<Value> {
    match kind {
        PropertyKind::String | PropertyKind::Ref { .. } | PropertyKind::Any => Ok(Value::String(text.to_string())),
        PropertyKind::Integer => parse_integer(text),
        PropertyKind::Number => parse_number(text),
        PropertyKind::Boolean => parse_boolean(text),
        PropertyKind::Enum { values } => Ok(match_enum(text, values)),
        PropertyKind::Date => normalize_date(text, date_config)
            .map(Value::String)
            .ok_or_else(|| CoercionError::Date(text.to_string())),
        PropertyKind::DateTime => normalize_datetime(text)
            .map(Value::String)
            .ok_or_else(|| CoercionError::DateTime(text.to_string())),
        PropertyKind::Object => parse_json_literal(text),
    }
}

/// Parse a JSON object or array literal written into a single cell
pub fn parse_json_literal(text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        _ => Err(CoercionError::Json(text.to_string())),
    }
}

/// Whether cell text looks like a JSON object or array literal
#[must_use]
pub fn looks_like_json(text: &str) -> bool {
    let text = text.trim();
    (text.starts_with('[') && text.ends_with(']')) || (text.starts_with('{') && text.ends_with('}'))
}

fn parse_integer(text: &str) -> Result<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(float_to_integer)
        .ok_or_else(|| CoercionError::Integer(text.to_string()))
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_integer(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn parse_number(text: &str) -> Result<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CoercionError::Number(text.to_string()))
}

fn parse_boolean(text: &str) -> Result<Value> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" => Ok(Value::Bool(true)),
        "false" | "f" => Ok(Value::Bool(false)),
        _ => Err(CoercionError::Boolean(text.to_string())),
    }
}

/// Match an enum value case-insensitively, then by unique prefix
///
/// Anything else is returned unchanged and left for the validator.
fn match_enum(text: &str, values: &[Value]) -> Value {
    let lowered = text.to_lowercase();
    let names: Vec<&str> = values.iter().filter_map(Value::as_str).collect();

    if let Some(exact) = names.iter().find(|name| name.to_lowercase() == lowered) {
        return Value::String((*exact).to_string());
    }
    let mut prefixed = names.iter().filter(|name| name.to_lowercase().starts_with(&lowered));
    match (prefixed.next(), prefixed.next()) {
        (Some(only), None) if !lowered.is_empty() => Value::String((*only).to_string()),
        _ => Value::String(text.to_string()),
    }
}
