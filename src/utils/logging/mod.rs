//! Logging utilities for output and progress tracking
//!
//! This module provides standardized operation logging and progress bars.

pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use log::{log_issue_summary, log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_main_progress_bar, create_spinner, finish_progress_bar};
