//! Log record parsing and retention.
//!
//! Agent attempt logs are streams of multi-line records, each opened by a
//! boundary line carrying a millisecond timestamp. This module splits those
//! streams into records ([`RecordParser`]) and rewrites log trees keeping only
//! records at or after a cutoff ([`filter_log_tree`]).
//!
//! # Example
//!
//! ```ignore
//! use agent_bench::logs::{filter_log_tree, RetentionWindow};
//!
//! let window = RetentionWindow::parse("2025-04-27 14:10:00")?;
//! let report = filter_log_tree("logs".as_ref(), "new-logs".as_ref(), &window)?;
//! println!("{} files, {} failed", report.files.len(), report.failed_count());
//! ```

pub mod parser;
pub mod retention;

pub use parser::{parse_timestamp, LogRecord, RecordParser, BOUNDARY, TIMESTAMP_FORMAT};
pub use retention::{
    filter_log_file, filter_log_tree, filter_records, FileReport, FilterStats, RetentionWindow,
    TreeReport,
};
