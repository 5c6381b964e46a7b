//! Access to the data portal.
//!
//! The pipeline needs three things from a portal: a type's schema, the full
//! schema listing (for the type hierarchy) and the object stored at a path.
//! [`HttpPortal`] talks to a live server; [`MemoryPortal`] holds everything in
//! memory for offline runs and tests.

pub mod http;
pub mod memory;

use serde_json::{Map, Value};

use crate::error::Result;

pub use http::{HttpPortal, PortalKey};
pub use memory::MemoryPortal;

/// Portal collaborator used by an ingestion session
pub trait Portal: Send + Sync {
    /// Schema of one type, `None` when the type is unknown
    fn get_schema(&self, type_name: &str) -> Result<Option<Value>>;

    /// All schemas keyed by type name
    fn get_schemas(&self) -> Result<Map<String, Value>>;

    /// Object stored at a path such as `/CellLine/X1`, `None` when not found
    fn get_metadata(&self, path: &str) -> Result<Option<Value>>;
}

/// Build `/{Type}/{identifier}`
#[must_use]
pub fn object_path(type_name: &str, identifier: &str) -> String {
    format!("/{type_name}/{identifier}")
}

/// Build `/{identifier}`
#[must_use]
pub fn root_path(identifier: &str) -> String {
    format!("/{identifier}")
}
