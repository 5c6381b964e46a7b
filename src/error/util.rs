//! Utility functions for error handling
//!
//! File access helpers that turn bare IO errors into errors carrying the path
//! and the reason the file was needed.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{IngestError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
///
/// # Returns
/// * `Result<fs::File>` - The opened file or a detailed error
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(IngestError::file_error(
            format!("File not found (needed for {purpose})"),
            path,
        ));
    }

    if !path.is_file() {
        return Err(IngestError::file_error(
            format!("Path is not a file (expected a file for {purpose})"),
            path,
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                "Permission denied - check file permissions".to_string()
            }
            io::ErrorKind::NotFound => {
                "File not found - it may have been deleted during operation".to_string()
            }
            _ => format!("Failed to open file for {purpose}"),
        };
        IngestError::file_error_with_source(context, path, e)
    })
}

/// Check if a directory exists and is readable, with rich error information
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(IngestError::file_error(
            format!("Directory not found (needed for {purpose})"),
            path,
        ));
    }

    if !path.is_dir() {
        return Err(IngestError::file_error(
            format!("Path is not a directory (expected a directory for {purpose})"),
            path,
        ));
    }

    match fs::read_dir(path) {
        Ok(_) => Ok(()),
        Err(e) => {
            let context = match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    "Permission denied - check directory permissions".to_string()
                }
                _ => format!("Failed to access directory for {purpose}"),
            };
            Err(IngestError::file_error_with_source(context, path, e))
        }
    }
}

/// Safely read a file to string with rich error information
///
/// A leading UTF-8 byte order mark is removed.
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;

    let mut content = String::new();
    match file.read_to_string(&mut content) {
        Ok(_) => Ok(strip_bom(content)),
        Err(e) => {
            let context = match e.kind() {
                io::ErrorKind::InvalidData => {
                    "File contains invalid UTF-8 data - cannot read as text".to_string()
                }
                _ => format!("Failed to read file content for {purpose}"),
            };
            Err(IngestError::file_error_with_source(context, path, e))
        }
    }
}

fn strip_bom(content: String) -> String {
    match content.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => content,
    }
}
