//! Portal type schemas.
//!
//! A [`Schema`] wraps the JSON Schema of one portal type and flattens its
//! properties into column keys: nested object properties are joined with `.`
//! and every array level adds `#`, so a schema with `stu: [string]` and
//! `vw: [{xyz: string}]` yields the keys `stu#` and `vw#.xyz`. Each key maps
//! to a [`PropertyInfo`] used to coerce cells and find references.

pub mod adapt;
pub mod cache;
pub mod names;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::error::{IngestError, Result};
pub use adapt::{DateFormatConfig, PropertyKind};
pub use cache::SchemaCache;
pub use names::{to_camel_case, type_name};

/// Separator for nested object properties in column names
pub const DOTTED_NAME_DELIMITER: char = '.';
/// Marker for array properties in column names
pub const ARRAY_NAME_SUFFIX: char = '#';

/// Type information for one flattened property key
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    /// The adorned key (`vw#.xyz`)
    pub key: String,
    pub kind: PropertyKind,
    /// Regular expression the value must match, if declared
    pub pattern: Option<String>,
}

impl PropertyInfo {
    /// Whether the key passes through an array
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.key.contains(ARRAY_NAME_SUFFIX)
    }
}

/// A parsed portal type schema
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    json: Value,
    properties: IndexMap<String, PropertyInfo>,
    /// Unadorned key (`vw.xyz`) to adorned key (`vw#.xyz`)
    aliases: FxHashMap<String, String>,
    required: Vec<String>,
    identifying: Vec<String>,
    super_type: Option<String>,
}

impl Schema {
    /// Parse a schema document
    ///
    /// # Arguments
    /// * `name` - The type name
    /// * `json` - The JSON Schema document
    ///
    /// # Returns
    /// * `Result<Schema>` - The schema, or `InvalidSchema` for property names
    ///   containing `#` and arrays whose item type is missing or ambiguous
    pub fn new(name: impl Into<String>, json: Value) -> Result<Self> {
        let name = name.into();
        if !json.is_object() {
            return Err(IngestError::invalid_schema(name, "schema is not a JSON object"));
        }

        let mut properties = IndexMap::new();
        flatten_properties(&name, &json, None, &mut properties)?;

        let aliases = properties
            .keys()
            .filter(|key| key.contains(ARRAY_NAME_SUFFIX))
            .map(|key| (unadorn_column_name(key), key.clone()))
            .collect();

        let required = string_list(json.get("required"));
        let identifying = identifying_property_names(&json);
        let super_type = json
            .get("rdfs:subClassOf")
            .and_then(Value::as_str)
            .and_then(profile_type_name)
            .filter(|parent| parent != "Item");

        Ok(Self {
            name,
            json,
            properties,
            aliases,
            required,
            identifying,
            super_type,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original schema document
    #[must_use]
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// All flattened properties in schema order
    pub fn properties(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.properties.values()
    }

    /// Look up a property by adorned key or by its unadorned form
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyInfo> {
        self.properties.get(key).or_else(|| {
            self.aliases
                .get(&unadorn_column_name(key))
                .and_then(|adorned| self.properties.get(adorned))
        })
    }

    /// Whether the schema declares a top-level property
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.json
            .get("properties")
            .and_then(|properties| properties.get(name))
            .is_some()
    }

    /// Required top-level properties
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Properties required by the `anyOf`/`oneOf` branches of the schema
    #[must_use]
    pub fn conditional_required(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        for keyword in ["anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = self.json.get(keyword) {
                for branch in branches {
                    for property in string_list(branch.get("required")) {
                        if !result.contains(&property) {
                            result.push(property);
                        }
                    }
                }
            }
        }
        result
    }

    /// Identifying properties, `uuid` and `identifier` first and `aliases` last
    #[must_use]
    pub fn identifying_properties(&self) -> &[String] {
        &self.identifying
    }

    /// Direct parent type (`rdfs:subClassOf`), ignoring `Item`
    #[must_use]
    pub fn super_type(&self) -> Option<&str> {
        self.super_type.as_deref()
    }

    /// Pattern declared for a top-level property (or its array items)
    #[must_use]
    pub fn property_pattern(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(|info| info.pattern.as_deref())
    }

    /// Rewrite a column name so its array markers match the schema
    ///
    /// `tags` becomes `tags#` when `tags` is an array property, and `vw.xyz`
    /// becomes `vw#.xyz`. Explicit indexes (`vw#2.xyz`) are kept. Unknown
    /// columns are returned unchanged.
    #[must_use]
    pub fn rationalize_column_name(&self, column: &str) -> String {
        let Some(info) = self.property(column) else {
            return column.to_string();
        };
        let column_parts: Vec<&str> = column.split(DOTTED_NAME_DELIMITER).collect();
        let schema_parts: Vec<&str> = info.key.split(DOTTED_NAME_DELIMITER).collect();
        if column_parts.len() != schema_parts.len() {
            return column.to_string();
        }

        column_parts
            .iter()
            .zip(schema_parts.iter())
            .map(|(column_part, schema_part)| {
                let wanted = schema_part.matches(ARRAY_NAME_SUFFIX).count();
                let present = column_part.matches(ARRAY_NAME_SUFFIX).count();
                if present < wanted {
                    let mut part = (*column_part).to_string();
                    part.extend(std::iter::repeat_n(ARRAY_NAME_SUFFIX, wanted - present));
                    part
                } else {
                    (*column_part).to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(&DOTTED_NAME_DELIMITER.to_string())
    }

    /// Find every reference value inside an object
    ///
    /// Walks the object alongside the flattened keys and returns the location
    /// and target type of each string value whose property is a `linkTo`.
    #[must_use]
    pub fn collect_refs(&self, object: &Map<String, Value>) -> Vec<RefSite> {
        let mut sites = Vec::new();
        for (key, value) in object {
            let mut location = vec![LocationStep::Key(key.clone())];
            self.walk_refs(key.clone(), value, &mut location, &mut sites);
        }
        sites
    }

    fn walk_refs(&self, key: String, value: &Value, location: &mut Vec<LocationStep>, sites: &mut Vec<RefSite>) {
        match value {
            Value::String(token) => {
                if let Some(link_to) = self.properties.get(&key).and_then(|info| info.kind.link_to()) {
                    sites.push(RefSite {
                        location: location.clone(),
                        link_to: link_to.to_string(),
                        token: token.clone(),
                    });
                }
            }
            Value::Array(items) => {
                let item_key = format!("{key}{ARRAY_NAME_SUFFIX}");
                for (index, item) in items.iter().enumerate() {
                    location.push(LocationStep::Index(index));
                    self.walk_refs(item_key.clone(), item, location, sites);
                    location.pop();
                }
            }
            Value::Object(map) => {
                for (child, item) in map {
                    location.push(LocationStep::Key(child.clone()));
                    self.walk_refs(format!("{key}{DOTTED_NAME_DELIMITER}{child}"), item, location, sites);
                    location.pop();
                }
            }
            _ => {}
        }
    }
}

/// One step into a JSON value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationStep {
    Key(String),
    Index(usize),
}

/// A reference value found inside an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    pub location: Vec<LocationStep>,
    pub link_to: String,
    pub token: String,
}

/// Remove every array marker and index from a column name
///
/// `vw#2.xyz#` becomes `vw.xyz`.
#[must_use]
pub fn unadorn_column_name(column: &str) -> String {
    column
        .split(DOTTED_NAME_DELIMITER)
        .map(|part| part.split(ARRAY_NAME_SUFFIX).next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(&DOTTED_NAME_DELIMITER.to_string())
}

/// Type name from a profile reference such as `/profiles/SubmittedFile.json`
#[must_use]
pub fn profile_type_name(reference: &str) -> Option<String> {
    let name = reference
        .trim_start_matches("/profiles/")
        .trim_end_matches(".json")
        .trim_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

fn flatten_properties(
    type_name: &str,
    schema: &Value,
    parent_key: Option<&str>,
    result: &mut IndexMap<String, PropertyInfo>,
) -> Result<()> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        // Leaf reached through an array or object without declared properties
        if let Some(key) = parent_key {
            insert_leaf(key.to_string(), schema, result);
        }
        return Ok(());
    };

    for (name, definition) in properties {
        if !definition.as_object().is_some_and(|d| !d.is_empty()) {
            continue;
        }
        let key = match parent_key {
            Some(parent) => format!("{parent}{DOTTED_NAME_DELIMITER}{name}"),
            None => name.clone(),
        };
        if name.contains(ARRAY_NAME_SUFFIX) {
            return Err(IngestError::invalid_schema(
                type_name,
                format!("property name with '{ARRAY_NAME_SUFFIX}' is not supported: {key}"),
            ));
        }

        match definition.get("type").and_then(Value::as_str) {
            Some("object") if definition.get("properties").is_some() => {
                flatten_properties(type_name, definition, Some(&key), result)?;
            }
            Some("array") => {
                let mut key = key;
                let mut items = definition;
                while items.get("type").and_then(Value::as_str) == Some("array") {
                    match items.get("items") {
                        Some(next @ Value::Object(_)) => {
                            key.push(ARRAY_NAME_SUFFIX);
                            items = next;
                        }
                        None | Some(Value::Array(_)) => {
                            return Err(IngestError::invalid_schema(
                                type_name,
                                format!("array of undefined or multiple types is not supported: {key}"),
                            ));
                        }
                        Some(_) => {
                            return Err(IngestError::invalid_schema(
                                type_name,
                                format!("invalid array type specifier: {key}"),
                            ));
                        }
                    }
                }
                if items.get("properties").is_some() {
                    flatten_properties(type_name, items, Some(&key), result)?;
                } else {
                    insert_leaf(key, items, result);
                }
            }
            _ => insert_leaf(key, definition, result),
        }
    }
    Ok(())
}

fn insert_leaf(key: String, definition: &Value, result: &mut IndexMap<String, PropertyInfo>) {
    let info = PropertyInfo {
        key: key.clone(),
        kind: PropertyKind::from_definition(definition),
        pattern: definition.get("pattern").and_then(Value::as_str).map(str::to_string),
    };
    result.insert(key, info);
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn identifying_property_names(schema: &Value) -> Vec<String> {
    let mut names = string_list(schema.get("identifyingProperties"));
    let declares_identifier = schema
        .get("properties")
        .and_then(|properties| properties.get("identifier"))
        .is_some();
    if declares_identifier && !names.iter().any(|name| name == "identifier") {
        names.push("identifier".to_string());
    }
    let rank = |name: &str| match name {
        "uuid" => 0,
        "identifier" => 1,
        "aliases" => 3,
        _ => 2,
    };
    names.sort_by_key(|name| rank(name));
    names
}
