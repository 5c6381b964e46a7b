//! Module for handling date parsing and formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::schema::adapt::types::DateFormatConfig;

/// Formats accepted for date-time values without an offset
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a date string with multiple format attempts
#[must_use]
pub fn parse_date_string(s: &str, config: &DateFormatConfig) -> Option<NaiveDate> {
    config
        .date_formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// Parse and normalize a date, returning it in the configured output format
#[must_use]
pub fn normalize_date(s: &str, config: &DateFormatConfig) -> Option<String> {
    parse_date_string(s, config).map(|date| date.format(&config.default_format).to_string())
}

/// Parse a date-time string
///
/// RFC 3339 values are returned as given; offset-less values are accepted in
/// ISO form and returned unchanged.
#[must_use]
pub fn normalize_datetime(s: &str) -> Option<String> {
    if DateTime::parse_from_rfc3339(s).is_ok() {
        return Some(s.to_string());
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|_| s.to_string())
}
