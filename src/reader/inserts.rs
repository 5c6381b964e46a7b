//! Readers for structured inputs: JSON, JSON Lines, YAML and inserts directories.

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde_json::Value;

use crate::error::util::{safe_read_to_string, validate_directory};
use crate::error::{IngestError, Result};
use crate::reader::{Sheet, TableSet, sheet_name_for};
use crate::utils::logging::log_warning;

/// Read a JSON file
pub(crate) fn read_json_file(path: &Path) -> Result<TableSet> {
    let content = safe_read_to_string(path, "reading JSON bundle")?;
    if content.trim().is_empty() {
        return Ok(TableSet::new());
    }
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| IngestError::parse(sheet_name_for(path), Some(e.line()), e.to_string()))?;
    tables_from_document(&sheet_name_for(path), value, None)
}

/// Read a YAML file; it holds the same shapes as a JSON file
pub(crate) fn read_yaml_file(path: &Path) -> Result<TableSet> {
    let content = safe_read_to_string(path, "reading YAML bundle")?;
    if content.trim().is_empty() {
        return Ok(TableSet::new());
    }
    let value: Value = serde_yaml::from_str(&content)?;
    tables_from_document(&sheet_name_for(path), value, None)
}

/// Read a JSON Lines file with one object per line
pub(crate) fn read_jsonl_file(path: &Path) -> Result<TableSet> {
    let name = sheet_name_for(path);
    let content = safe_read_to_string(path, "reading JSON Lines bundle")?;

    let records = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line)
                .map_err(|e| IngestError::parse(name.clone(), Some(index + 1), e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tables = TableSet::new();
    if !records.is_empty() {
        tables.push(Sheet::from_records(name, records)?);
    }
    Ok(tables)
}

/// Read an inserts directory
///
/// Every `*.json` file is one sheet named by the part of its file name before
/// the first dot, so `CellLine.json` and `CellLine.v2.json` both feed `CellLine`
/// (the second one is reported as a duplicate).
pub(crate) fn read_inserts_directory(dir: &Path) -> Result<TableSet> {
    validate_directory(dir, "reading inserts directory")?;

    let files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| IngestError::file_error_with_source("Failed to list inserts directory", dir, e))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .sorted()
        .collect();

    if files.is_empty() {
        log_warning("No JSON files found in inserts directory", Some(dir));
    }

    let mut tables = TableSet::new();
    for file in files {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = file_name.split('.').next().unwrap_or_default().to_string();

        let content = safe_read_to_string(&file, "reading insert file")?;
        if content.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| IngestError::parse(name.clone(), Some(e.line()), e.to_string()))?;
        let file_tables = tables_from_document(&name, value, Some(&file))?;
        let (sheets, issues) = file_tables.into_parts();
        tables.issues.extend(issues.into_vec());
        for sheet in sheets {
            tables.push(sheet);
        }
    }
    Ok(tables)
}

/// Split a parsed document into sheets
///
/// An array is one sheet named `default_name`. An object whose values are all
/// arrays holds one sheet per key. Any other object is a single record.
fn tables_from_document(default_name: &str, value: Value, file: Option<&Path>) -> Result<TableSet> {
    let mut tables = TableSet::new();
    let add = |tables: &mut TableSet, name: &str, records: Vec<Value>| -> Result<()> {
        let mut sheet = Sheet::from_records(name, records)?;
        sheet.file = file.map(Path::to_path_buf);
        tables.push(sheet);
        Ok(())
    };

    match value {
        Value::Array(records) => add(&mut tables, default_name, records)?,
        Value::Object(map) if !map.is_empty() && map.values().all(Value::is_array) => {
            for (name, records) in map {
                if let Value::Array(records) = records {
                    add(&mut tables, &name, records)?;
                }
            }
        }
        Value::Object(map) => add(&mut tables, default_name, vec![Value::Object(map)])?,
        Value::Null => {}
        other => {
            return Err(IngestError::parse(
                default_name,
                None,
                format!("expected an array or object of records, found {other}"),
            ));
        }
    }
    Ok(tables)
}
