//! Logging helpers
//!
//! Standardized messages for operations on bundle files and for issue summaries.

use std::path::Path;
use std::time::Duration;

use itertools::Itertools;

use crate::issues::IssueLog;

/// Log the start of an operation on a file or directory
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the file or directory being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation} {}", path.display());
}

/// Log the completion of an operation
///
/// # Arguments
/// * `operation` - Past-tense description of the operation
/// * `path` - Path of the file or directory that was operated on
/// * `items` - Number of rows or objects processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {operation} {items} rows from {} in {duration:?}",
            path.display()
        ),
        None => log::info!("Successfully {operation} {items} rows from {}", path.display()),
    }
}

/// Log a warning, optionally about a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Log how many issues of each kind a pass produced
pub fn log_issue_summary(issues: &IssueLog) {
    if issues.is_empty() {
        log::info!("No issues found");
        return;
    }
    let counts = issues
        .iter()
        .counts_by(|issue| issue.kind)
        .into_iter()
        .sorted_by_key(|(kind, _)| format!("{kind:?}"))
        .map(|(kind, count)| format!("{count} {kind:?}"))
        .join(", ");
    if issues.has_errors() {
        log::warn!("Found {} issues: {counts}", issues.len());
    } else {
        log::info!("Found {} issues: {counts}", issues.len());
    }
}
