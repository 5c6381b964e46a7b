//! Error handling for bundle ingestion.
//!
//! Hard failures (unreadable files, portal transport errors, bad configuration)
//! are returned as [`IngestError`]. Problems with individual cells, references or
//! objects are not errors in this sense; they are collected as
//! [`Issue`](crate::issues::Issue)s so a whole bundle can be reported in one pass.

pub mod util;

use std::io;
use std::path::{Path, PathBuf};

/// Specialized error type for ingestion
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error with additional file context
    #[error("{message}: {}", .path.display())]
    File {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },

    /// No reader exists for the file type
    #[error("Unsupported input format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Malformed tabular input
    #[error("Parse error in sheet '{sheet}'{}: {message}", row_suffix(.row))]
    Parse {
        sheet: String,
        row: Option<usize>,
        message: String,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Excel workbook error
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// The portal does not know the requested type
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// The schema exists but cannot be used
    #[error("Invalid schema for {type_name}: {message}")]
    InvalidSchema { type_name: String, message: String },

    /// Portal transport or protocol error
    #[error("Portal error: {0}")]
    Portal(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|row| format!(" row {row}")).unwrap_or_default()
}

impl IngestError {
    /// Create a parse error for a sheet, optionally pointing at a row
    pub fn parse(sheet: impl Into<String>, row: Option<usize>, message: impl Into<String>) -> Self {
        Self::Parse {
            sheet: sheet.into(),
            row,
            message: message.into(),
        }
    }

    /// Create a file error without an underlying IO error
    pub fn file_error(message: impl Into<String>, path: &Path) -> Self {
        Self::File {
            message: message.into(),
            path: path.to_path_buf(),
            source: None,
        }
    }

    /// Create a file error wrapping an IO error
    pub fn file_error_with_source(message: impl Into<String>, path: &Path, source: io::Error) -> Self {
        Self::File {
            message: message.into(),
            path: path.to_path_buf(),
            source: Some(source),
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error only concerns a single type or sheet
    ///
    /// Such errors are reported as issues and processing continues with
    /// unrelated sheets.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::SchemaNotFound(_) | Self::InvalidSchema { .. } | Self::Parse { .. }
        )
    }
}

impl From<figment::Error> for IngestError {
    fn from(error: figment::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;
