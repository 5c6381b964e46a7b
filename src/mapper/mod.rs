//! Row-to-object mapping.
//!
//! A [`RowMapper`] is built once per sheet from its header and (optional)
//! schema, then turns every row into a candidate object. Column names are
//! parsed into paths (see [`column`]), cells are coerced to the property types
//! the schema declares, and the result is pruned of empty values.

pub mod column;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::issues::{IssueKind, IssueLog, Provenance};
use crate::reader::{CellValue, Row};
use crate::schema::Schema;
use crate::schema::adapt::{PropertyKind, coerce_cell, coerce_text, looks_like_json, parse_json_literal};

pub use column::{ColumnPath, PathSegment};

/// A mapped object and the row it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub sheet: String,
    /// 1-based data row number
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub data: Map<String, Value>,
}

impl Candidate {
    /// Provenance of the candidate's row
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        Provenance::sheet(self.sheet.clone())
            .with_row(self.row)
            .with_file(self.file.as_deref())
    }
}

#[derive(Debug, Clone)]
struct MappedColumn {
    /// Header text as written
    name: String,
    path: ColumnPath,
    kind: PropertyKind,
}

/// Maps the rows of one sheet to objects
#[derive(Debug)]
pub struct RowMapper<'a> {
    type_name: &'a str,
    schema: Option<&'a Schema>,
    config: &'a IngestConfig,
    columns: Vec<MappedColumn>,
}

impl<'a> RowMapper<'a> {
    /// Prepare a mapper for a sheet
    ///
    /// # Arguments
    /// * `type_name` - The sheet's type name
    /// * `header` - The sheet header
    /// * `schema` - The type's schema; `None` maps every cell untyped
    /// * `config` - Session configuration
    ///
    /// # Returns
    /// * `Result<RowMapper>` - The mapper, or a parse error for malformed or
    ///   inconsistent column names
    pub fn new(
        type_name: &'a str,
        header: &[String],
        schema: Option<&'a Schema>,
        config: &'a IngestConfig,
    ) -> Result<Self> {
        let mut columns = Vec::with_capacity(header.len());
        for name in header {
            let rationalized = schema.map_or_else(|| name.clone(), |schema| schema.rationalize_column_name(name));
            let path = ColumnPath::parse(&rationalized).map_err(|message| IngestError::parse(type_name, None, message))?;
            let kind = schema
                .and_then(|schema| schema.property(&rationalized))
                .map_or(PropertyKind::Any, |info| info.kind.clone());
            columns.push(MappedColumn {
                name: name.clone(),
                path,
                kind,
            });
        }

        let paths: Vec<ColumnPath> = columns.iter().map(|column| column.path.clone()).collect();
        column::check_consistency(type_name, &paths)?;

        Ok(Self {
            type_name,
            schema,
            config,
            columns,
        })
    }

    /// Map one row to an object
    ///
    /// Empty cells produce no property. Cells that do not fit their declared
    /// type are kept as text and reported as coercion issues.
    pub fn map_row(&self, row: &Row, file: Option<&Path>, issues: &mut IssueLog) -> Map<String, Value> {
        let mut object = Value::Object(Map::new());

        for (column, cell) in self.columns.iter().zip(&row.cells) {
            if cell.is_empty() {
                continue;
            }
            let src = || {
                Provenance::sheet(self.type_name)
                    .with_row(row.number)
                    .with_column(column.name.clone())
                    .with_file(file)
            };

            match cell {
                CellValue::Json(value) => {
                    set_value(&mut object, column.path.without_append().segments(), value.clone());
                }
                _ if column.path.is_append() => {
                    let text = cell.as_text();
                    if looks_like_json(&text) {
                        if let Ok(value @ Value::Array(_)) = parse_json_literal(&text) {
                            set_value(&mut object, column.path.without_append().segments(), value);
                            continue;
                        }
                    }
                    let items = split_array_cell(&text, self.config.array_delimiter, self.config.array_escape)
                        .into_iter()
                        .map(|item| {
                            coerce_text(&item, &column.kind, &self.config.date_format_config).unwrap_or_else(|e| {
                                issues.note(IssueKind::Coercion, src(), e.to_string());
                                Value::String(item)
                            })
                        })
                        .collect();
                    set_value(&mut object, column.path.segments(), Value::Array(items));
                }
                _ => {
                    let value = coerce_cell(cell, &column.kind, &self.config.date_format_config).unwrap_or_else(|e| {
                        issues.note(IssueKind::Coercion, src(), e.to_string());
                        Value::String(cell.as_text().into_owned())
                    });
                    set_value(&mut object, column.path.segments(), value);
                }
            }
        }

        if self.config.prune {
            prune(&mut object);
        }

        let Value::Object(mut map) = object else {
            return Map::new();
        };
        if let Some(schema) = self.schema {
            for (property, value) in &self.config.autoadd {
                if schema.has_property(property) && !map.contains_key(property) {
                    map.insert(property.clone(), value.clone());
                }
            }
        }
        map
    }
}

/// Write a value at a column path, creating objects and arrays on the way
///
/// Arrays are padded up to the addressed index with `{}` when the element is
/// an object and with `null` otherwise.
fn set_value(target: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    match first {
        PathSegment::Key(key) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                set_value(child, rest, value);
            }
        }
        PathSegment::Index(index) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                while items.len() <= *index {
                    items.push(match rest.first() {
                        Some(PathSegment::Key(_)) => Value::Object(Map::new()),
                        _ => Value::Null,
                    });
                }
                set_value(&mut items[*index], rest, value);
            }
        }
        PathSegment::Append => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if let (Value::Array(items), Value::Array(new_items)) = (target, value) {
                items.extend(new_items);
            }
        }
    }
}

/// Split an array cell on the delimiter
///
/// The escape character makes a following delimiter (or escape) literal.
/// Items are trimmed and empty items dropped.
#[must_use]
pub fn split_array_cell(text: &str, delimiter: char, escape: Option<char>) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.peek() {
                Some(&next) if next == delimiter || Some(next) == escape => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push(c),
            }
        } else if c == delimiter {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Whether a value counts as empty for pruning
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Remove empty values
///
/// Empty properties are removed from objects. Arrays lose their trailing empty
/// elements only; an empty element followed by a non-empty one stays so the
/// gap can be reported.
pub fn prune(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                prune(child);
            }
            map.retain(|_, child| !is_empty_value(child));
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                prune(item);
            }
            while items.last().is_some_and(is_empty_value) {
                items.pop();
            }
        }
        _ => {}
    }
}
