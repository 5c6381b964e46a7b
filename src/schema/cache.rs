//! Session-scoped schema cache.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::portal::Portal;
use crate::schema::names::{fallback_type_name, type_name};
use crate::schema::{Schema, profile_type_name};

#[derive(Debug, Clone)]
enum CacheEntry {
    Found(Arc<Schema>),
    Missing,
    Invalid(String),
}

impl CacheEntry {
    fn to_result(&self, name: &str) -> Result<Arc<Schema>> {
        match self {
            Self::Found(schema) => Ok(Arc::clone(schema)),
            Self::Missing => Err(IngestError::SchemaNotFound(name.to_string())),
            Self::Invalid(message) => Err(IngestError::invalid_schema(name, message.clone())),
        }
    }
}

/// Lazily populated cache of type schemas
///
/// Each type is fetched from the portal at most once; misses and unusable
/// schemas are remembered too. Schemas supplied up front take precedence over
/// the portal's.
pub struct SchemaCache<'p> {
    portal: &'p dyn Portal,
    entries: FxHashMap<String, CacheEntry>,
    overrides: FxHashMap<String, Value>,
    /// Direct subtypes of every type, built from the full schema listing
    children: Option<FxHashMap<String, Vec<String>>>,
}

impl<'p> SchemaCache<'p> {
    pub fn new(portal: &'p dyn Portal) -> Self {
        Self {
            portal,
            entries: FxHashMap::default(),
            overrides: FxHashMap::default(),
            children: None,
        }
    }

    /// Use these schemas instead of asking the portal for the same types
    #[must_use]
    pub fn with_schemas(mut self, schemas: impl IntoIterator<Item = (String, Value)>) -> Self {
        for (name, schema) in schemas {
            self.overrides.insert(type_name(&name), schema);
        }
        self
    }

    /// Get the schema of a type, fetching it on first use
    ///
    /// # Returns
    /// * `Ok(schema)` - The parsed schema
    /// * `Err(SchemaNotFound)` / `Err(InvalidSchema)` - The type is unknown or its
    ///   schema is unusable (remembered for the session)
    /// * Any other error - Transport failure, not remembered
    pub fn get_schema(&mut self, name: &str) -> Result<Arc<Schema>> {
        let name = type_name(name);
        if let Some(entry) = self.entries.get(&name) {
            return entry.to_result(&name);
        }

        let (resolved_name, entry) = self.fetch(&name)?;
        if resolved_name != name {
            self.entries.insert(resolved_name, entry.clone());
        }
        self.entries.insert(name.clone(), entry.clone());
        entry.to_result(&name)
    }

    /// Schema of a type if it was already loaded successfully
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<Arc<Schema>> {
        match self.entries.get(&type_name(name)) {
            Some(CacheEntry::Found(schema)) => Some(Arc::clone(schema)),
            _ => None,
        }
    }

    fn fetch(&self, name: &str) -> Result<(String, CacheEntry)> {
        let candidates = std::iter::once(name.to_string()).chain(fallback_type_name(name));
        for candidate in candidates {
            let json = match self.overrides.get(&candidate) {
                Some(json) => Some(json.clone()),
                None => self.portal.get_schema(&candidate)?,
            };
            if let Some(json) = json {
                log::debug!("Loaded schema for {candidate}");
                let entry = match Schema::new(candidate.clone(), json) {
                    Ok(schema) => CacheEntry::Found(Arc::new(schema)),
                    Err(IngestError::InvalidSchema { message, .. }) => CacheEntry::Invalid(message),
                    Err(e) => CacheEntry::Invalid(e.to_string()),
                };
                return Ok((candidate, entry));
            }
        }
        log::warn!("No schema found for type {name}");
        Ok((name.to_string(), CacheEntry::Missing))
    }

    /// Identifying properties of a type
    ///
    /// Unknown types have none.
    pub fn identifying_properties(&mut self, name: &str) -> Result<Vec<String>> {
        match self.get_schema(name) {
            Ok(schema) => Ok(schema.identifying_properties().to_vec()),
            Err(e) if e.is_local() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// All subtypes of a type, breadth first
    ///
    /// The full schema listing is fetched once per session for this.
    pub fn subtypes(&mut self, name: &str) -> Result<Vec<String>> {
        if self.children.is_none() {
            self.children = Some(self.build_children()?);
        }
        let Some(children) = self.children.as_ref() else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let root = type_name(name);
        seen.insert(root.as_str());
        queue.push_back(root.as_str());
        while let Some(current) = queue.pop_front() {
            for child in children.get(current).into_iter().flatten() {
                if seen.insert(child.as_str()) {
                    result.push(child.clone());
                    queue.push_back(child.as_str());
                }
            }
        }
        Ok(result)
    }

    fn build_children(&self) -> Result<FxHashMap<String, Vec<String>>> {
        let listing = self.portal.get_schemas()?;
        let mut children: FxHashMap<String, Vec<String>> = FxHashMap::default();

        let portal_schemas = listing
            .iter()
            .filter(|(name, _)| !self.overrides.contains_key(&type_name(name)));
        let all = portal_schemas.chain(self.overrides.iter());
        for (name, schema) in all {
            let parent = schema
                .get("rdfs:subClassOf")
                .and_then(Value::as_str)
                .and_then(profile_type_name)
                .filter(|parent| parent != "Item");
            if let Some(parent) = parent {
                let child = type_name(name);
                let entry = children.entry(parent).or_default();
                if !entry.contains(&child) {
                    entry.push(child);
                }
            }
        }
        Ok(children)
    }
}
