//! Tabular readers for metadata bundles.
//!
//! Every supported input format is read into a [`TableSet`]: an ordered set of
//! named sheets, each with a header and rows of raw [`CellValue`]s. Nothing
//! here knows about schemas; typing happens in the mapper.

mod delimited;
mod excel;
mod header;
mod inserts;

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::ReaderOptions;
use crate::error::{IngestError, Result};
use crate::issues::{Issue, IssueKind, IssueLog, Provenance};
use crate::utils::logging::{log_operation_complete, log_operation_start};

pub use header::RowAssembler;

/// A raw cell as read from the input
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Already structured value from a JSON or YAML source
    Json(Value),
}

impl CellValue {
    /// Build a cell from text, trimming it; blank text is `Empty`
    pub fn text(text: impl AsRef<str>) -> Self {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::String(trimmed.to_string())
        }
    }

    /// Build a cell from a structured value; `null` is `Empty`
    #[must_use]
    pub fn json(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) if s.trim().is_empty() => Self::Empty,
            other => Self::Json(other),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The cell rendered as text
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Empty => Cow::Borrowed(""),
            Self::String(s) => Cow::Borrowed(s),
            Self::Integer(i) => Cow::Owned(i.to_string()),
            Self::Float(f) => Cow::Owned(f.to_string()),
            Self::Boolean(b) => Cow::Owned(b.to_string()),
            Self::Json(Value::String(s)) => Cow::Borrowed(s),
            Self::Json(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// One data row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based data row number (the header is not counted)
    pub number: usize,
    /// Cells aligned with the sheet header
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Whether every cell in the row is empty
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

/// A named table with a header and ordered rows
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
    /// Reader warnings (empty header cells, extra values)
    pub warnings: Vec<String>,
    /// The file this sheet came from, when it differs per sheet
    pub file: Option<PathBuf>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a cell of a row by column name
    #[must_use]
    pub fn cell<'a>(&self, row: &'a Row, column: &str) -> Option<&'a CellValue> {
        self.header
            .iter()
            .position(|name| name == column)
            .and_then(|index| row.cells.get(index))
    }

    /// Build a sheet from structured records (JSON, YAML)
    ///
    /// The header is the union of the record keys in first-seen order.
    pub fn from_records(name: impl Into<String>, records: Vec<Value>) -> Result<Self> {
        let mut sheet = Self::new(name);
        let mut objects = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match record {
                Value::Object(map) => objects.push(map),
                other => {
                    return Err(IngestError::parse(
                        sheet.name.clone(),
                        Some(index + 1),
                        format!("expected an object, found {other}"),
                    ));
                }
            }
        }

        let mut header: IndexMap<String, ()> = IndexMap::new();
        for object in &objects {
            for key in object.keys() {
                header.entry(key.trim().to_string()).or_default();
            }
        }
        sheet.header = header.into_keys().collect();

        for (index, mut object) in objects.into_iter().enumerate() {
            let trimmed: IndexMap<String, Value> = object
                .iter_mut()
                .map(|(key, value)| (key.trim().to_string(), value.take()))
                .collect();
            let cells = sheet
                .header
                .iter()
                .map(|column| trimmed.get(column).cloned().map_or(CellValue::Empty, CellValue::json))
                .collect();
            sheet.rows.push(Row {
                number: index + 1,
                cells,
            });
        }
        Ok(sheet)
    }
}

/// Ordered set of uniquely named sheets
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub source: Option<PathBuf>,
    sheets: IndexMap<String, Sheet>,
    /// Problems found while reading that did not stop the read
    pub issues: IssueLog,
}

impl TableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet
    ///
    /// Sheet names are trimmed; parenthesized names such as `(notes)` are
    /// skipped and a second sheet with the same name is reported and dropped.
    pub fn push(&mut self, mut sheet: Sheet) {
        sheet.name = sheet.name.trim().to_string();
        if sheet.name.starts_with('(') && sheet.name.ends_with(')') {
            log::debug!("Skipping sheet {}", sheet.name);
            return;
        }
        if self.sheets.contains_key(&sheet.name) {
            self.issues.push(Issue::new(
                IssueKind::Parse,
                Provenance::sheet(sheet.name.clone()).with_file(sheet.file.as_deref()),
                "Duplicate sheet name; ignoring this sheet.",
            ));
            return;
        }
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.values()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Split into the sheets and the read issues
    #[must_use]
    pub fn into_parts(self) -> (Vec<Sheet>, IssueLog) {
        (self.sheets.into_values().collect(), self.issues)
    }

    /// Move the named sheets to the front, in the given order
    ///
    /// Names are compared after type-name normalization. Sheets not listed
    /// keep their relative order after the listed ones.
    pub fn reorder(&mut self, order: &[String]) {
        if order.is_empty() {
            return;
        }
        let rank = |name: &str| {
            let type_name = crate::schema::type_name(name);
            order
                .iter()
                .position(|wanted| crate::schema::type_name(wanted) == type_name)
                .unwrap_or(order.len())
        };
        // Stable sort keeps file order among equal ranks
        self.sheets.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Excel,
    Json,
    JsonLines,
    Yaml,
    InsertsDirectory,
}

impl InputFormat {
    /// Detect the format from a path
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::InsertsDirectory);
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xls" => Ok(Self::Excel),
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::JsonLines),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(IngestError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read a bundle file (or inserts directory) into a table set
///
/// # Arguments
/// * `path` - The bundle file or directory
/// * `options` - Reader options
///
/// # Returns
/// * `Result<TableSet>` - The sheets in file order
pub fn load_table_set(path: &Path, options: &ReaderOptions) -> Result<TableSet> {
    let start = Instant::now();
    log_operation_start("Reading bundle", path);

    let mut tables = match InputFormat::detect(path)? {
        InputFormat::Csv => delimited::read_delimited(path, b',', options)?,
        InputFormat::Tsv => delimited::read_delimited(path, b'\t', options)?,
        InputFormat::Excel => excel::read_workbook(path)?,
        InputFormat::Json => inserts::read_json_file(path)?,
        InputFormat::JsonLines => inserts::read_jsonl_file(path)?,
        InputFormat::Yaml => inserts::read_yaml_file(path)?,
        InputFormat::InsertsDirectory => inserts::read_inserts_directory(path)?,
    };
    tables.source = Some(path.to_path_buf());

    let rows: usize = tables.sheets().map(|sheet| sheet.rows.len()).sum();
    log_operation_complete("read", path, rows, Some(start.elapsed()));
    Ok(tables)
}

/// Name of the single sheet held by a one-table file
pub(crate) fn sheet_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
