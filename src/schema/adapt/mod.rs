//! Module for coercing raw cell values to the types their schema declares.

pub mod conversions;
pub mod date_utils;
pub mod types;

// Re-export the main types and functions for easier access
pub use conversions::{coerce_cell, coerce_text, looks_like_json, parse_json_literal};
pub use date_utils::{normalize_date, normalize_datetime, parse_date_string};
pub use types::{CoercionError, DateFormatConfig, PropertyKind};
