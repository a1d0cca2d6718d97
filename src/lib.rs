//! agent-bench: resumable benchmark runner for tool-using agents.
//!
//! This library runs an external agent over GAIA-style benchmark tasks,
//! records one answer per task in an append-only JSONL store, and filters
//! the resulting per-task agent logs by timestamp.

// Core modules
pub mod cli;
pub mod dataset;
pub mod error;
pub mod logs;
pub mod runner;
pub mod storage;

// Re-export commonly used error types
pub use error::{ConfigError, DatasetError, LogFilterError, ResultStoreError};
