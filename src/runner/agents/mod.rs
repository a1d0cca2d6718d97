//! Agent adapters.
//!
//! An adapter knows how to:
//! 1. Launch the agent with a query
//! 2. Route the agent's log output into the attempt log
//! 3. Report how the invocation ended
//!
//! Whether the attempt produced an answer is decided afterwards by the
//! runner, from the output file named in the query.

pub mod command;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::log_sink::AttemptLog;

pub use command::CommandAdapter;

/// Environment variable holding the attempt log path.
pub const LOG_PATH_ENV: &str = "AGENT_BENCH_LOG_PATH";
/// Environment variable holding the expected output file path.
pub const OUTPUT_PATH_ENV: &str = "AGENT_BENCH_OUTPUT_PATH";
/// Environment variable holding the task id.
pub const TASK_ID_ENV: &str = "AGENT_BENCH_TASK_ID";

/// Everything an adapter needs for one attempt.
#[derive(Clone, Copy)]
pub struct AgentRequest<'a> {
    pub task_id: &'a str,
    /// Full prompt, including where to write the answer.
    pub query: &'a str,
    /// Where the agent is expected to write its answer.
    pub output_path: &'a Path,
    /// Log handle owned by this attempt.
    pub log: &'a AttemptLog,
    pub timeout: Duration,
}

/// How an invocation ended.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    /// Exit code from the agent process (`-1` when killed by a signal).
    pub exit_code: i32,
    pub duration: Duration,
}

impl AgentOutput {
    pub fn new(exit_code: i32, duration: Duration) -> Self {
        Self {
            exit_code,
            duration,
        }
    }

    /// Checks if the agent exited cleanly (exit code 0).
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for agent adapters.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs one attempt.
    async fn run(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError>;
}

/// Error type for agent invocations.
///
/// Every variant counts as a failed attempt; none of them stops the run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
