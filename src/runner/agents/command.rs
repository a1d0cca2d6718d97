//! Command-line agent adapter.
//!
//! Runs any agent executable that reads its query from stdin. Each stdout
//! line is recorded in the attempt log at INFO, each stderr line at WARN.

use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{
    AgentAdapter, AgentError, AgentOutput, AgentRequest, LOG_PATH_ENV, OUTPUT_PATH_ENV,
    TASK_ID_ENV,
};
use crate::runner::config::RunConfig;

/// Adapter that spawns a local agent process per attempt.
pub struct CommandAdapter {
    /// Executable to run.
    command: String,
    /// Arguments passed verbatim.
    args: Vec<String>,
    /// Working directory for the process.
    working_dir: Option<PathBuf>,
    /// Extra environment variables.
    env_vars: Vec<(String, String)>,
}

impl CommandAdapter {
    /// Creates a new adapter for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env_vars: Vec::new(),
        }
    }

    /// Builds the adapter described by a run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        let mut adapter = Self::new(config.agent_command.clone()).with_args(config.agent_args.clone());
        adapter.working_dir = config.agent_dir.clone();
        adapter.env_vars = config.env_vars.clone();
        adapter
    }

    /// Sets the arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl AgentAdapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.command
    }

    async fn run(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env(LOG_PATH_ENV, request.log.path())
            .env(OUTPUT_PATH_ENV, request.output_path)
            .env(TASK_ID_ENV, request.task_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        info!(task_id = %request.task_id, "Starting agent: {}", self.command);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentError::NotFound(self.command.clone())
            } else {
                AgentError::ExecutionFailed(format!("Failed to spawn {}: {}", self.command, e))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // An agent that exits without reading its input is judged by its
            // output file like any other.
            if let Err(e) = stdin.write_all(request.query.as_bytes()).await {
                warn!(task_id = %request.task_id, error = %e, "Failed to write query to agent");
            }
            stdin.shutdown().await.ok();
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stderr not captured".into()))?;
        // Raw bytes: agent output is not guaranteed to be UTF-8.
        let mut stdout_lines = BufReader::new(stdout).split(b'\n');
        let mut stderr_lines = BufReader::new(stderr).split(b'\n');
        let log = request.log;

        let pump = async {
            let mut stdout_open = true;
            let mut stderr_open = true;
            while stdout_open || stderr_open {
                tokio::select! {
                    line = stdout_lines.next_segment(), if stdout_open => match line {
                        Ok(Some(l)) => log.info(decode_line(&l)),
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            warn!("Error reading agent stdout: {}", e);
                            stdout_open = false;
                        }
                    },
                    line = stderr_lines.next_segment(), if stderr_open => match line {
                        Ok(Some(l)) => log.warn(decode_line(&l)),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            warn!("Error reading agent stderr: {}", e);
                            stderr_open = false;
                        }
                    },
                }
            }
            child.wait().await
        };
        let waited = tokio::time::timeout(request.timeout, pump).await;

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(AgentError::ExecutionFailed(format!("Process error: {}", e)));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Agent process already gone");
                }
                return Err(AgentError::Timeout(request.timeout));
            }
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);
        debug!(task_id = %request.task_id, exit_code, ?duration, "Agent exited");
        Ok(AgentOutput::new(exit_code, duration))
    }
}

/// Lossy UTF-8 with the trailing `\r` of CRLF output removed.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}
