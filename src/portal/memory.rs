//! In-memory portal.

use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::error::util::{safe_read_to_string, validate_directory};
use crate::error::{IngestError, Result};
use crate::portal::{Portal, object_path, root_path};
use crate::schema::{Schema, type_name};

/// Portal whose schemas and objects live in memory
///
/// Objects are registered under every path a real portal would answer for
/// them: `/{uuid}`, `/{Type}/{uuid}`, `/{Type}/{identifying value}` (also for
/// each super type) and `/{accession}`.
#[derive(Debug, Default)]
pub struct MemoryPortal {
    schemas: IndexMap<String, Value>,
    objects: RwLock<FxHashMap<String, Value>>,
    requests: Mutex<FxHashMap<String, usize>>,
}

impl MemoryPortal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema
    #[must_use]
    pub fn with_schema(mut self, name: &str, schema: Value) -> Self {
        self.schemas.insert(type_name(name), schema);
        self
    }

    /// Load every `*.json` file in a directory as a schema named by its file stem
    pub fn from_schema_dir(dir: &Path) -> Result<Self> {
        validate_directory(dir, "loading schemas")?;
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut portal = Self::new();
        for path in paths {
            let content = safe_read_to_string(&path, "loading schema")?;
            let schema: Value = serde_json::from_str(&content)?;
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            portal = portal.with_schema(&name, schema);
        }
        log::info!("Loaded {} schemas from {}", portal.schemas.len(), dir.display());
        Ok(portal)
    }

    /// Store an object of a type
    ///
    /// # Returns
    /// * `Result<Vec<String>>` - The paths the object was registered under
    pub fn insert_object(&self, type_name: &str, object: Value) -> Result<Vec<String>> {
        let paths = self.object_paths(type_name, &object)?;
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        for path in &paths {
            objects.insert(path.clone(), object.clone());
        }
        Ok(paths)
    }

    fn object_paths(&self, type_name: &str, object: &Value) -> Result<Vec<String>> {
        let mut types = vec![type_name.to_string()];
        let mut identifying = vec!["uuid".to_string()];
        let mut current = Some(type_name.to_string());
        while let Some(name) = current.take() {
            let Some(json) = self.schemas.get(&name) else {
                break;
            };
            let schema = Schema::new(name.clone(), json.clone())?;
            if name == type_name {
                identifying.extend(schema.identifying_properties().iter().cloned());
            }
            // Stop at a type already seen
            if let Some(parent) = schema.super_type().filter(|parent| !types.iter().any(|seen| seen == parent)) {
                types.push(parent.to_string());
                current = Some(parent.to_string());
            }
        }

        let mut paths = Vec::new();
        let mut push = |path: String| {
            if !paths.contains(&path) {
                paths.push(path);
            }
        };
        if let Some(uuid) = object.get("uuid").and_then(Value::as_str) {
            push(root_path(uuid));
        }
        if let Some(accession) = object.get("accession").and_then(Value::as_str) {
            push(root_path(accession));
        }
        for property in &identifying {
            for value in identifier_values(object.get(property)) {
                for owner in &types {
                    push(object_path(owner, &value));
                }
            }
        }
        if paths.is_empty() {
            return Err(IngestError::Portal(format!(
                "{type_name} object has no identifying value to store it under"
            )));
        }
        Ok(paths)
    }

    /// Number of metadata requests made for a path
    #[must_use]
    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Number of schema requests made for a type
    #[must_use]
    pub fn schema_request_count(&self, type_name: &str) -> usize {
        self.request_count(&format!("/profiles/{type_name}.json"))
    }

    /// Total number of requests of any kind
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    fn count(&self, path: &str) {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        *requests.entry(path.to_string()).or_default() += 1;
    }
}

/// String values of an identifying property; lists are expanded
pub(crate) fn identifier_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl Portal for MemoryPortal {
    fn get_schema(&self, type_name: &str) -> Result<Option<Value>> {
        self.count(&format!("/profiles/{type_name}.json"));
        Ok(self.schemas.get(type_name).cloned())
    }

    fn get_schemas(&self) -> Result<Map<String, Value>> {
        self.count("/profiles/");
        Ok(self
            .schemas
            .iter()
            .map(|(name, schema)| (name.clone(), schema.clone()))
            .collect())
    }

    fn get_metadata(&self, path: &str) -> Result<Option<Value>> {
        self.count(path);
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.get(path).cloned())
    }
}
