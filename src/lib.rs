//! A Rust library for turning spreadsheet-style metadata bundles into
//! schema-validated, reference-resolved portal objects.
//!
//! A bundle is read into a [`TableSet`], mapped row by row into candidate
//! objects using each type's JSON Schema, cross references are resolved
//! within the bundle and against the portal, every object is validated, and
//! finally a create/update plan is computed against the current portal state.

pub mod config;
pub mod diff;
pub mod error;
pub mod issues;
pub mod loader;
pub mod mapper;
pub mod portal;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod utils;
pub mod validate;

// Re-export the most common types for easier use
pub use config::{IngestConfig, LookupConfig, ReaderOptions};
pub use error::{IngestError, Result};
pub use issues::{Issue, IssueKind, IssueLog, Provenance};

// Pipeline stages
pub use diff::{DiffAction, DiffEntry, DiffPlan, DiffPlanner, PropertyDiff};
pub use loader::{Candidate, IngestReport, IngestSession, StructuredDataSet, ingest_file, load_bundles_parallel};
pub use reader::{CellValue, Row, Sheet, TableSet, load_table_set};
pub use resolver::{ReferenceResolver, Resolution};
pub use schema::{PropertyKind, Schema, SchemaCache};
pub use validate::Validator;

// Portals
pub use portal::{HttpPortal, MemoryPortal, Portal};
