//! Validation of mapped objects.
//!
//! Every candidate is checked against its type's JSON Schema (draft 7) and for
//! gaps in array properties. Problems are recorded as validation issues on the
//! candidate's sheet, row and top-level column; candidates are never changed.

pub mod arrays;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::issues::{Issue, IssueKind, IssueLog, Provenance};
use crate::mapper::Candidate;
use crate::schema::{ARRAY_NAME_SUFFIX, DOTTED_NAME_DELIMITER, Schema};

pub use arrays::{ArrayGap, find_gaps};

/// Validates candidates, compiling each type's schema once
#[derive(Default)]
pub struct Validator {
    compiled: FxHashMap<String, Option<JSONSchema>>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("types", &self.compiled.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the candidates of one type
    ///
    /// # Arguments
    /// * `schema` - The type's schema
    /// * `candidates` - The type's mapped objects
    /// * `issues` - Where problems are recorded; coercion issues already in
    ///   the log suppress validation issues on the same row and column
    ///
    /// # Returns
    /// The number of issues added
    pub fn validate(&mut self, schema: &Schema, candidates: &[Candidate], issues: &mut IssueLog) -> usize {
        let before = issues.len();
        let type_name = schema.name().to_string();

        if !self.compiled.contains_key(&type_name) {
            let compiled = match JSONSchema::options().with_draft(Draft::Draft7).compile(schema.json()) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    let message = format!("Unable to compile schema: {e}");
                    log::warn!("{type_name}: {message}");
                    issues.note(IssueKind::Schema, Provenance::sheet(type_name.clone()), message);
                    None
                }
            };
            self.compiled.insert(type_name.clone(), compiled);
        }

        let conditional = schema.conditional_required();
        let mut found = Vec::new();
        for candidate in candidates {
            let instance = Value::Object(candidate.data.clone());
            if let Some(Some(compiled)) = self.compiled.get(&type_name) {
                if let Err(errors) = compiled.validate(&instance) {
                    for error in errors {
                        let pointer = error.instance_path.to_string();
                        let (column, message) = match &error.kind {
                            ValidationErrorKind::Required { property } if pointer.is_empty() => {
                                (property.as_str().map(str::to_string), error.to_string())
                            }
                            ValidationErrorKind::AnyOf | ValidationErrorKind::OneOfNotValid
                                if pointer.is_empty() && !conditional.is_empty() =>
                            {
                                (
                                    None,
                                    format!(
                                        "Missing one of the conditionally required properties: {}",
                                        conditional.join(", ")
                                    ),
                                )
                            }
                            _ => (first_path_segment(&pointer), error.to_string()),
                        };
                        found.push((candidate, column, message));
                    }
                }
            }

            for gap in find_gaps(&candidate.data) {
                found.push((
                    candidate,
                    Some(gap.property),
                    format!("Array has an empty element at {} followed by a non-empty element", gap.path),
                ));
            }
        }

        for (candidate, column, message) in found {
            let src = match &column {
                Some(column) => {
                    if has_coercion_issue(issues, candidate, column) {
                        continue;
                    }
                    candidate.provenance().with_column(column.clone())
                }
                None => candidate.provenance(),
            };
            issues.push(Issue::new(IssueKind::Validation, src, message));
        }

        let added = issues.len() - before;
        if added > 0 {
            log::info!("{type_name}: {added} validation issues in {} objects", candidates.len());
        }
        added
    }
}

/// First segment of a JSON pointer, unescaped
fn first_path_segment(pointer: &str) -> Option<String> {
    pointer
        .split('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
}

/// Top-level property a column name writes to
fn top_level_property(column: &str) -> &str {
    column
        .split(DOTTED_NAME_DELIMITER)
        .next()
        .and_then(|part| part.split(ARRAY_NAME_SUFFIX).next())
        .unwrap_or(column)
}

fn has_coercion_issue(issues: &IssueLog, candidate: &Candidate, property: &str) -> bool {
    issues.of_kind(IssueKind::Coercion).any(|issue| {
        issue.src.sheet.as_deref() == Some(candidate.sheet.as_str())
            && issue.src.row == Some(candidate.row)
            && issue
                .src
                .column
                .as_deref()
                .is_some_and(|column| top_level_property(column) == property)
    })
}
