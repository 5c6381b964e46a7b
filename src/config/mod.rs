//! Configuration for bundle ingestion.
//!
//! Every knob lives in [`IngestConfig`]. It can be built in code (it implements
//! `Default`) or loaded from a YAML file with [`IngestConfig::from_path`].

use std::path::Path;

use figment::Figment;
use figment::providers::{Format, Yaml};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestError, Result};
pub use crate::schema::adapt::DateFormatConfig;

/// Pattern for portal accession identifiers
pub const DEFAULT_ACCESSION_PATTERN: &str = "^SMA[1-9A-Z]{9}$";

/// Configuration for an ingestion session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Separator between values of an array column within one cell
    pub array_delimiter: char,
    /// Escape character that makes the next character literal inside an array cell
    pub array_escape: Option<char>,
    /// Remove empty values from mapped objects
    pub prune: bool,
    /// Skip reference resolution; reference tokens are kept verbatim
    pub norefs: bool,
    /// Run JSON Schema validation after mapping
    pub validate: bool,
    /// Properties filled with a fixed value when absent from a row
    pub autoadd: IndexMap<String, Value>,
    /// Type names to process first, in this order
    pub sheet_order: Vec<String>,
    /// Which portal paths a reference token is looked up at
    pub lookup: LookupConfig,
    /// Date formats accepted for `date` properties
    pub date_format_config: DateFormatConfig,
    /// Reader options
    pub reader: ReaderOptions,
    /// Compute a create/update plan against the portal after building
    pub plan: bool,
    /// Show progress bars for multi-bundle loads
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            array_delimiter: '|',
            array_escape: Some('\\'),
            prune: true,
            norefs: false,
            validate: true,
            autoadd: IndexMap::new(),
            sheet_order: Vec::new(),
            lookup: LookupConfig::default(),
            date_format_config: DateFormatConfig::default(),
            reader: ReaderOptions::default(),
            plan: false,
            show_progress: false,
        }
    }
}

impl IngestConfig {
    /// Load a configuration from a YAML file
    ///
    /// Keys that are not present keep their default value.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML file
    ///
    /// # Returns
    /// * `Result<IngestConfig>` - The loaded configuration
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = crate::error::util::safe_read_to_string(path, "loading configuration")?;
        Self::from_yaml_str(&content)
    }

    /// Parse a configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = Figment::new().merge(Yaml::string(content)).extract()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if Some(self.array_delimiter) == self.array_escape {
            return Err(IngestError::Config(format!(
                "array delimiter and escape character must differ (both '{}')",
                self.array_delimiter
            )));
        }
        if let Some(pattern) = &self.lookup.accession_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                IngestError::Config(format!("invalid accession pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }

    /// Set norefs mode
    #[must_use]
    pub fn with_norefs(mut self, norefs: bool) -> Self {
        self.norefs = norefs;
        self
    }

    /// Add a fixed value for a property
    #[must_use]
    pub fn with_autoadd(mut self, property: impl Into<String>, value: Value) -> Self {
        self.autoadd.insert(property.into(), value);
        self
    }
}

/// Toggles for where reference tokens are looked up on the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Look up `/{Type}/{token}`
    pub specified_type: bool,
    /// Look up `/{token}`
    pub root: bool,
    /// Look up `/{token}` before `/{Type}/{token}`
    pub root_first: bool,
    /// Look up `/{Subtype}/{token}` for every subtype
    pub subtypes: bool,
    /// Narrow the paths using the patterns declared on identifying properties
    pub infer_from_schema: bool,
    /// Tokens matching this pattern are treated as accessions
    pub accession_pattern: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            specified_type: true,
            root: true,
            root_first: false,
            subtypes: true,
            infer_from_schema: true,
            accession_pattern: Some(DEFAULT_ACCESSION_PATTERN.to_string()),
        }
    }
}

impl LookupConfig {
    /// Only look up `/{Type}/{token}`
    #[must_use]
    pub fn specified_type_only() -> Self {
        Self {
            root: false,
            subtypes: false,
            ..Self::default()
        }
    }
}

/// Options for the tabular readers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Expand `\n`, `\t`, `\r` and `\\` in CSV cell text
    pub escaping: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.array_delimiter, '|');
        assert_eq!(config.array_escape, Some('\\'));
        assert!(config.prune);
        assert!(!config.norefs);
        assert!(config.lookup.specified_type);
        assert!(config.lookup.root);
        assert!(!config.lookup.root_first);
        assert!(config.lookup.subtypes);
    }

    #[test]
    fn test_yaml_overrides_keep_defaults() {
        let config = IngestConfig::from_yaml_str(
            "array_delimiter: ';'\nnorefs: true\nlookup:\n  root_first: true\nautoadd:\n  submission_centers: [\"smaht\"]\n",
        )
        .unwrap();
        assert_eq!(config.array_delimiter, ';');
        assert!(config.norefs);
        assert!(config.lookup.root_first);
        assert!(config.lookup.specified_type);
        assert_eq!(
            config.autoadd.get("submission_centers"),
            Some(&serde_json::json!(["smaht"]))
        );
        assert_eq!(config.date_format_config.date_formats, vec!["%Y-%m-%d".to_string()]);
    }

    #[test]
    fn test_conflicting_delimiter_rejected() {
        let result = IngestConfig::from_yaml_str("array_delimiter: '|'\narray_escape: '|'\n");
        assert!(matches!(result, Err(IngestError::Config(_))));
    }
}
