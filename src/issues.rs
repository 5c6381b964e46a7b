//! Soft problems found while processing a bundle.
//!
//! Coercion, reference and validation problems never abort a pass. Each one is
//! recorded as an [`Issue`] tagged with where it came from, so the whole bundle
//! can be reported and fixed at once.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Category of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// Malformed input (file, sheet or header)
    Parse,
    /// Unknown type or unusable schema
    Schema,
    /// Cell value does not fit the declared property type
    Coercion,
    /// Unresolved or ambiguous reference
    Reference,
    /// JSON Schema constraint violation
    Validation,
    /// Something suspicious that does not block submission
    Warning,
}

impl IssueKind {
    #[must_use]
    pub fn is_error(self) -> bool {
        self != Self::Warning
    }
}

/// Where an issue originated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Provenance {
    pub fn sheet(sheet: impl Into<String>) -> Self {
        Self {
            sheet: Some(sheet.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(|f| f.display().to_string());
        self
    }

    /// `Type.column [row]`, with the file base name in front when known
    fn label(&self) -> String {
        let mut label = String::new();
        let mut sep = ".";
        if let Some(file) = &self.file {
            let base = Path::new(file)
                .file_name()
                .map_or_else(|| file.clone(), |name| name.to_string_lossy().to_string());
            label.push_str(&base);
            sep = ":";
        }
        if let Some(sheet) = &self.sheet {
            if !label.is_empty() {
                label.push_str(sep);
            }
            label.push_str(sheet);
            sep = ".";
        }
        if let Some(column) = &self.column {
            if !label.is_empty() {
                label.push_str(sep);
            }
            label.push_str(column);
        }
        if let Some(row) = self.row.filter(|row| *row > 0) {
            if !label.is_empty() {
                label.push(' ');
            }
            label.push_str(&format!("[{row}]"));
        }
        label
    }
}

/// A single problem found in a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub src: Provenance,
    pub message: String,
    /// Candidate types for an ambiguous reference
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

impl Issue {
    pub fn new(kind: IssueKind, src: Provenance, message: impl Into<String>) -> Self {
        Self {
            kind,
            src,
            message: message.into(),
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    /// Whether this issue points at the given sheet, row and column
    #[must_use]
    pub fn is_at(&self, sheet: &str, row: usize, column: &str) -> bool {
        self.src.sheet.as_deref() == Some(sheet)
            && self.src.row == Some(row)
            && self.src.column.as_deref() == Some(column)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.src.label();
        let label = if label.is_empty() {
            if self.is_error() { "Error".to_string() } else { "Warning".to_string() }
        } else {
            label
        };
        write!(f, "{label}: {}", self.message)
    }
}

/// Ordered collection of issues for one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueLog {
    issues: Vec<Issue>,
}

impl IssueLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        log::debug!("{issue}");
        self.issues.push(issue);
    }

    pub fn note(&mut self, kind: IssueKind, src: Provenance, message: impl Into<String>) {
        self.push(Issue::new(kind, src, message));
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|issue| issue.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.of_kind(IssueKind::Warning)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }

    /// Whether an issue of `kind` already exists for this cell
    #[must_use]
    pub fn has_issue_at(&self, kind: IssueKind, sheet: &str, row: usize, column: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.kind == kind && issue.is_at(sheet, row, column))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Issue> {
        self.issues
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Issue] {
        &self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(
            IssueKind::Reference,
            Provenance::sheet("CellSample").with_row(2).with_column("biosources"),
            "Unable to resolve reference: /CellLine/X9",
        );
        assert_eq!(
            issue.to_string(),
            "CellSample.biosources [2]: Unable to resolve reference: /CellLine/X9"
        );
    }

    #[test]
    fn test_issue_display_with_file_and_no_column() {
        let issue = Issue::new(
            IssueKind::Validation,
            Provenance::sheet("CellLine")
                .with_row(1)
                .with_file(Some(Path::new("/tmp/inserts/CellLine.json"))),
            "'submitted_id' is a required property",
        );
        assert_eq!(
            issue.to_string(),
            "CellLine.json:CellLine [1]: 'submitted_id' is a required property"
        );

        let bare = Issue::new(IssueKind::Warning, Provenance::default(), "nothing to see");
        assert_eq!(bare.to_string(), "Warning: nothing to see");
    }

    #[test]
    fn test_issue_log_lookup() {
        let mut log = IssueLog::new();
        log.note(
            IssueKind::Coercion,
            Provenance::sheet("CellLine").with_row(3).with_column("age"),
            "invalid integer value: '1.5'",
        );
        log.note(IssueKind::Warning, Provenance::sheet("CellLine"), "Extra column values on row [4]");

        assert!(log.has_errors());
        assert_eq!(log.errors().count(), 1);
        assert_eq!(log.warnings().count(), 1);
        assert!(log.has_issue_at(IssueKind::Coercion, "CellLine", 3, "age"));
        assert!(!log.has_issue_at(IssueKind::Coercion, "CellLine", 2, "age"));
    }
}
