//! Portal lookup path generation.

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::config::LookupConfig;
use crate::portal::{object_path, root_path};
use crate::schema::Schema;

const UUID_PATTERN: &str = "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

/// Compiled schema patterns, keyed by their source text
///
/// Patterns the `regex` crate cannot compile are remembered as `None` and
/// treated as matching anything.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: FxHashMap<String, Option<Regex>>,
}

impl PatternCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `value` matches `pattern`
    pub fn matches(&mut self, pattern: &str, value: &str) -> bool {
        let compiled = self.compiled.entry(pattern.to_string()).or_insert_with(|| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::debug!("Ignoring pattern {pattern} the regex engine cannot compile: {e}");
                None
            }
        });
        compiled.as_ref().is_none_or(|regex| regex.is_match(value))
    }
}

/// Plans which portal paths a reference token is looked up at
#[derive(Debug)]
pub struct LookupPlanner {
    config: LookupConfig,
    accession: Option<Regex>,
    patterns: PatternCache,
}

impl LookupPlanner {
    pub fn new(config: &LookupConfig) -> Self {
        let accession = config
            .accession_pattern
            .as_deref()
            .and_then(|pattern| Regex::new(pattern).ok());
        Self {
            config: config.clone(),
            accession,
            patterns: PatternCache::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Whether a token looks like an accession
    #[must_use]
    pub fn is_accession(&self, token: &str) -> bool {
        self.accession.as_ref().is_some_and(|regex| regex.is_match(token))
    }

    /// Paths to try, in order, for a token referencing `type_name`
    ///
    /// # Arguments
    /// * `type_name` - The referenced type
    /// * `token` - The reference value
    /// * `schema` - The referenced type's schema, if known
    /// * `subtypes` - Subtypes of the referenced type, breadth first
    ///
    /// # Returns
    /// The paths in lookup order; empty when the token cannot identify an
    /// object of the type
    pub fn paths(&mut self, type_name: &str, token: &str, schema: Option<&Schema>, subtypes: &[String]) -> Vec<String> {
        let mut specified = self.config.specified_type;
        let mut root = self.config.root;
        let mut include_subtypes = self.config.subtypes;

        if let Some(schema) = schema.filter(|_| self.config.infer_from_schema) {
            let submitted_id_pattern = schema.property_pattern("submitted_id");
            if schema.has_property("accession") && self.is_accession(token) {
                root = true;
                specified = false;
                include_subtypes = false;
            } else if submitted_id_pattern.is_some_and(|pattern| self.patterns.matches(pattern, token)) {
                root = false;
                specified = true;
                include_subtypes = false;
            } else if !self.is_plausible(schema, token) {
                log::debug!("{token} cannot identify a {type_name}; not looking it up");
                return Vec::new();
            }
        }

        let mut paths = Vec::new();
        if root && self.config.root_first {
            paths.push(root_path(token));
        }
        if specified {
            paths.push(object_path(type_name, token));
        }
        if root && !self.config.root_first {
            paths.push(root_path(token));
        }
        if include_subtypes {
            paths.extend(subtypes.iter().map(|subtype| object_path(subtype, token)));
        }
        paths.dedup();
        paths
    }

    /// Whether the token matches the pattern of at least one identifying property
    ///
    /// Properties without a pattern accept anything.
    fn is_plausible(&mut self, schema: &Schema, token: &str) -> bool {
        let identifying = schema.identifying_properties();
        if identifying.is_empty() {
            return true;
        }
        identifying.iter().any(|property| {
            if property == "uuid" {
                return self.patterns.matches(UUID_PATTERN, token);
            }
            match schema.property_pattern(property) {
                Some(pattern) => self.patterns.matches(pattern, token),
                None => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(
            "CellLine",
            json!({
                "identifyingProperties": ["uuid", "submitted_id", "accession"],
                "properties": {
                    "uuid": {"type": "string", "format": "uuid"},
                    "accession": {"type": "string", "pattern": "^SMA[1-9A-Z]{9}$"},
                    "submitted_id": {"type": "string", "pattern": "^[A-Z0-9]{3,}_CELL-LINE_[A-Z0-9-_.]{4,}$"}
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_default_order_without_schema() {
        let mut planner = LookupPlanner::new(&LookupConfig::default());
        let paths = planner.paths("Sample", "abc", None, &["CellSample".to_string()]);
        assert_eq!(paths, vec!["/Sample/abc", "/abc", "/CellSample/abc"]);
    }

    #[test]
    fn test_root_first() {
        let config = LookupConfig {
            root_first: true,
            ..LookupConfig::default()
        };
        let mut planner = LookupPlanner::new(&config);
        assert_eq!(planner.paths("Sample", "abc", None, &[]), vec!["/abc", "/Sample/abc"]);
    }

    #[test]
    fn test_inferred_strategies() {
        let schema = schema();
        let mut planner = LookupPlanner::new(&LookupConfig::default());
        assert_eq!(planner.paths("CellLine", "SMAXYZ123456", Some(&schema), &[]), vec!["/SMAXYZ123456"]);
        assert_eq!(
            planner.paths("CellLine", "TEST_CELL-LINE_HELA", Some(&schema), &["Sub".to_string()]),
            vec!["/CellLine/TEST_CELL-LINE_HELA"]
        );
        assert!(planner.paths("CellLine", "hela", Some(&schema), &[]).is_empty());
        assert_eq!(
            planner.paths("CellLine", "123e4567-e89b-12d3-a456-426614174000", Some(&schema), &[]),
            vec!["/CellLine/123e4567-e89b-12d3-a456-426614174000", "/123e4567-e89b-12d3-a456-426614174000"]
        );
    }

    #[test]
    fn test_bad_pattern_matches_anything() {
        let mut patterns = PatternCache::new();
        assert!(patterns.matches("(?<=a)b", "anything"));
        assert!(!patterns.matches("^a$", "b"));
    }
}
