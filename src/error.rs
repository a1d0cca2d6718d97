//! Error types for agent-bench operations.
//!
//! Defines error types for the major subsystems:
//! - Run configuration loading and validation
//! - Dataset (task source) loading
//! - Result store persistence
//! - Log retention filtering
//!
//! Agent invocation errors live next to the adapter trait in
//! [`crate::runner::agents::AgentError`] because the orchestrator never
//! propagates them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors that can occur while loading benchmark tasks.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No task file for tier '{tier}' under {dir}")]
    TierNotFound { tier: String, dir: PathBuf },

    #[error("Malformed task at {path}:{line}: {source}")]
    MalformedTask {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate task_id '{0}' in dataset")]
    DuplicateTask(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while reading or appending to the result store.
#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("Failed to open result store '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append record for task '{task_id}': {source}")]
    Append {
        task_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while filtering log files.
#[derive(Debug, Error)]
pub enum LogFilterError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Invalid timestamp '{text}' at line {line}: {source}")]
    InvalidTimestamp {
        text: String,
        line: usize,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid cutoff '{0}': expected 'YYYY-MM-DD HH:MM:SS[.fff]'")]
    InvalidCutoff(String),

    #[error("Failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
