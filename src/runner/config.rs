//! Configuration for benchmark runs.
//!
//! Values are layered: defaults, then an optional YAML file, then
//! `AGENT_BENCH_*` environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dataset::{parse_tiers, Tier};
use crate::error::ConfigError;

/// Default number of attempts per task.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Default wall-clock limit for one agent attempt (30 minutes).
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 1800;

/// Configuration for running an agent over a benchmark split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Dataset split, e.g. `validation` or `test`.
    pub split: String,
    /// Tiers to process, in order.
    pub tiers: Vec<Tier>,
    /// Root of the local dataset export.
    pub dataset_dir: PathBuf,
    /// Result store path. Defaults to `gaia_{split}.jsonl`.
    pub result_file: Option<PathBuf>,
    /// Root directory for per-task logs and output files.
    pub log_root: PathBuf,
    /// Maximum attempts per task.
    pub retry_limit: u32,
    /// Agent executable.
    pub agent_command: String,
    /// Arguments passed to the agent executable.
    pub agent_args: Vec<String>,
    /// Working directory for the agent process.
    pub agent_dir: Option<PathBuf>,
    /// Extra environment variables for the agent process.
    pub env_vars: Vec<(String, String)>,
    /// Per-attempt timeout in seconds.
    pub agent_timeout_secs: u64,
    /// Turn Ctrl-C during an attempt into a failed attempt instead of exiting.
    pub handle_interrupts: bool,
}

impl RunConfig {
    /// Creates a configuration for `split` with defaults.
    pub fn new(split: impl Into<String>) -> Self {
        Self {
            split: split.into(),
            tiers: Tier::ALL.to_vec(),
            dataset_dir: PathBuf::from("./data/gaia"),
            result_file: None,
            log_root: PathBuf::from("logs"),
            retry_limit: DEFAULT_RETRY_LIMIT,
            agent_command: "python".to_string(),
            agent_args: vec!["main.py".to_string()],
            agent_dir: None,
            env_vars: Vec::new(),
            agent_timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
            handle_interrupts: true,
        }
    }

    /// Loads a configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Applies `AGENT_BENCH_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("AGENT_BENCH_SPLIT") {
            self.split = val;
        }
        if let Some(val) = lookup("AGENT_BENCH_TIERS") {
            self.tiers = parse_tiers(&val).map_err(|message| ConfigError::InvalidValue {
                key: "AGENT_BENCH_TIERS".to_string(),
                message,
            })?;
        }
        if let Some(val) = lookup("AGENT_BENCH_DATASET_DIR") {
            self.dataset_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("AGENT_BENCH_RESULT_FILE") {
            self.result_file = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("AGENT_BENCH_LOG_ROOT") {
            self.log_root = PathBuf::from(val);
        }
        if let Some(val) = lookup("AGENT_BENCH_RETRY_LIMIT") {
            self.retry_limit = parse_env_value(&val, "AGENT_BENCH_RETRY_LIMIT")?;
        }
        if let Some(val) = lookup("AGENT_BENCH_AGENT_CMD") {
            self.agent_command = val;
        }
        if let Some(val) = lookup("AGENT_BENCH_AGENT_DIR") {
            self.agent_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("AGENT_BENCH_AGENT_TIMEOUT_SECS") {
            self.agent_timeout_secs = parse_env_value(&val, "AGENT_BENCH_AGENT_TIMEOUT_SECS")?;
        }
        Ok(self)
    }

    /// Checks the configuration for values the runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.split.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("split must not be empty".into()));
        }
        if self.tiers.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one tier is required".into(),
            ));
        }
        if self.retry_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry_limit must be at least 1".into(),
            ));
        }
        if self.agent_command.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "agent_command must not be empty".into(),
            ));
        }
        if self.agent_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "agent_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Path of the result store.
    pub fn result_path(&self) -> PathBuf {
        self.result_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("gaia_{}.jsonl", self.split)))
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    /// Sets the dataset split.
    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        self.split = split.into();
        self
    }

    /// Sets the tiers to process.
    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Sets the dataset root.
    pub fn with_dataset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dataset_dir = dir.into();
        self
    }

    /// Sets the result store path.
    pub fn with_result_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_file = Some(path.into());
        self
    }

    /// Sets the log root.
    pub fn with_log_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_root = dir.into();
        self
    }

    /// Sets the maximum attempts per task.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Sets the agent command and its arguments.
    pub fn with_agent(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.agent_command = command.into();
        self.agent_args = args;
        self
    }

    /// Adds an environment variable for the agent process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Enables or disables Ctrl-C handling during attempts.
    pub fn with_interrupt_handling(mut self, enabled: bool) -> Self {
        self.handle_interrupts = enabled;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new("validation")
    }
}

fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("cannot parse '{}'", value),
    })
}
