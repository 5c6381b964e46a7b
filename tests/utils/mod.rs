use std::fs;
use std::path::{Path, PathBuf};

use portal_ingest::{IngestConfig, MemoryPortal, Result};
use serde_json::{Value, json};

/// Schema of the `CellLine` fixture type
#[must_use]
pub fn cell_line_schema() -> Value {
    json!({
        "title": "Cell Line",
        "type": "object",
        "identifyingProperties": ["uuid", "submitted_id", "aliases"],
        "required": ["submitted_id"],
        "properties": {
            "uuid": {"type": "string"},
            "submitted_id": {"type": "string"},
            "title": {"type": "string"},
            "passages": {"type": "integer"},
            "aliases": {"type": "array", "items": {"type": "string"}},
            "steps": {
                "type": "array",
                "items": {"type": "object", "properties": {"name": {"type": "string"}, "minutes": {"type": "number"}}}
            }
        }
    })
}

/// Schema of the `CellSample` fixture type, which references `CellLine`
#[must_use]
pub fn cell_sample_schema() -> Value {
    json!({
        "title": "Cell Sample",
        "type": "object",
        "identifyingProperties": ["uuid", "submitted_id"],
        "required": ["submitted_id"],
        "properties": {
            "uuid": {"type": "string"},
            "submitted_id": {"type": "string"},
            "preservation_date": {"type": "string", "format": "date"},
            "biosources": {"type": "array", "items": {"type": "string", "linkTo": "CellLine"}}
        }
    })
}

/// A portal that knows the fixture schemas and holds no objects
#[must_use]
pub fn test_portal() -> MemoryPortal {
    MemoryPortal::new()
        .with_schema("CellLine", cell_line_schema())
        .with_schema("CellSample", cell_sample_schema())
}

/// Default configuration for pipeline tests
#[must_use]
pub fn test_config() -> IngestConfig {
    IngestConfig::default()
}

/// Write a fixture file into a directory
pub fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content)?;
    Ok(path)
}
