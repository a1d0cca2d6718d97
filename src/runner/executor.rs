//! Benchmark executor - the main runner logic.
//!
//! Walks the configured tiers in order, skips tasks already present in the
//! result store, and gives every remaining task up to `retry_limit` agent
//! attempts. Each task ends with exactly one appended [`ResultRecord`], even
//! when no attempt produced an answer, so a later run never retries it.
//!
//! [`ResultRecord`]: crate::storage::ResultRecord

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::agents::{AgentAdapter, AgentError, AgentOutput, AgentRequest};
use super::answer::read_answer;
use super::config::RunConfig;
use super::interrupt::Interrupts;
use super::log_sink::AttemptLog;
use super::query::build_query;
use super::result::{AttemptFailure, RunSummary, TaskOutcome};
use crate::dataset::{Task, TaskSource, Tier};
use crate::error::{ConfigError, DatasetError, ResultStoreError};
use crate::storage::{load_resume_state, ResultStore};

/// Files belonging to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
    /// `{log_root}/{split}-{tier}`
    pub dir: PathBuf,
    /// Agent log, appended to by every attempt.
    pub log: PathBuf,
    /// File the agent writes its answer to.
    pub output: PathBuf,
}

impl TaskPaths {
    pub fn new(log_root: &Path, split: &str, tier: Tier, task_id: &str) -> Self {
        let dir = log_root.join(format!("{}-{}", split, tier));
        let stem = file_stem(task_id);
        Self {
            log: dir.join(format!("{}.log", stem)),
            output: dir.join(format!("{}.txt", stem)),
            dir,
        }
    }
}

/// Task ids become file names; anything outside `[A-Za-z0-9._-]` is replaced.
///
/// A replaced id gets a short hash of the original so distinct ids never
/// share a file.
fn file_stem(task_id: &str) -> String {
    let stem: String = task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem == task_id {
        return stem;
    }
    let mut hasher = Sha256::new();
    hasher.update(task_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", stem, &digest[..8])
}

/// How processing of one task ended.
enum TaskRun {
    Completed(TaskOutcome),
    /// The operator asked to stop; nothing is recorded for the task.
    Stopped,
}

/// Runs an agent over every pending task of a benchmark split.
pub struct BenchmarkRunner {
    config: RunConfig,
    adapter: Arc<dyn AgentAdapter>,
}

impl BenchmarkRunner {
    /// Creates a runner, validating the configuration.
    pub fn new(config: RunConfig, adapter: Arc<dyn AgentAdapter>) -> Result<Self, RunnerError> {
        config.validate()?;
        Ok(Self { config, adapter })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Processes every tier, resuming from the result store.
    ///
    /// With `handle_interrupts` set, Ctrl-C is listened for over the whole run.
    pub async fn run(&self, source: &dyn TaskSource) -> Result<RunSummary, RunnerError> {
        let mut interrupts = if self.config.handle_interrupts {
            Interrupts::listen()
        } else {
            Interrupts::disabled()
        };
        self.run_with_interrupts(source, &mut interrupts).await
    }

    /// Like [`run`](Self::run) with a caller-supplied interrupt source.
    pub async fn run_with_interrupts(
        &self,
        source: &dyn TaskSource,
        interrupts: &mut Interrupts,
    ) -> Result<RunSummary, RunnerError> {
        let run_id = format!("run-{}", Uuid::new_v4());
        let start = Instant::now();
        let mut summary = RunSummary::new(&run_id);

        let result_path = self.config.result_path();
        let log_root = std::path::absolute(&self.config.log_root).map_err(|e| {
            RunnerError::Setup(format!(
                "Failed to resolve log root {}: {}",
                self.config.log_root.display(),
                e
            ))
        })?;

        let mut state = load_resume_state(&result_path).await?;
        let mut store = ResultStore::open(&result_path).await?;

        info!(
            run_id = %run_id,
            split = %self.config.split,
            agent = %self.adapter.name(),
            result_file = %result_path.display(),
            already_processed = state.processed.len(),
            "Starting benchmark run"
        );

        'tiers: for &tier in &self.config.tiers {
            info!(tier = %tier, "Processing {}", tier);
            let tasks = source.tasks(tier)?;
            let total = tasks.len();

            for (idx, task) in tasks.iter().enumerate() {
                if interrupts.take_pending() {
                    warn!("Interrupted between tasks; stopping run");
                    summary.stopped_early = true;
                    break 'tiers;
                }
                if state.contains(&task.task_id) {
                    info!(
                        "\t({}/{}) Skipping task {} (already processed).",
                        idx + 1,
                        total,
                        task.task_id
                    );
                    summary.skipped += 1;
                    continue;
                }
                info!("\t({}/{}) Processing task {}", idx + 1, total, task.task_id);

                let paths = TaskPaths::new(&log_root, &self.config.split, tier, &task.task_id);
                tokio::fs::create_dir_all(&paths.dir).await.map_err(|e| {
                    RunnerError::Setup(format!(
                        "Failed to create task directory {}: {}",
                        paths.dir.display(),
                        e
                    ))
                })?;

                match self.process_task(task, tier, &paths, interrupts).await {
                    TaskRun::Completed(outcome) => {
                        store.append(&outcome.record()).await?;
                        state.insert(outcome.task_id.clone());
                        summary.record(&outcome);
                        info!(
                            task_id = %outcome.task_id,
                            attempts = outcome.attempts,
                            answered = outcome.is_answered(),
                            "\tProcessed task {} in {:.3}s.",
                            outcome.task_id,
                            outcome.duration.as_secs_f64()
                        );
                    }
                    TaskRun::Stopped => {
                        warn!(task_id = %task.task_id, "Run stopped by operator");
                        summary.stopped_early = true;
                        break 'tiers;
                    }
                }
            }
        }

        summary.duration = start.elapsed();
        info!("{}", summary);
        Ok(summary)
    }

    /// Gives one task up to `retry_limit` attempts.
    async fn process_task(
        &self,
        task: &Task,
        tier: Tier,
        paths: &TaskPaths,
        interrupts: &mut Interrupts,
    ) -> TaskRun {
        let start = Instant::now();
        let mut failures = Vec::new();
        let mut answer = String::new();
        let mut attempts = 0;

        while attempts < self.config.retry_limit {
            if interrupts.take_pending() {
                return TaskRun::Stopped;
            }
            attempts += 1;
            match self.attempt(task, paths, interrupts).await {
                Ok(found) => {
                    answer = found;
                    break;
                }
                Err(failure) => {
                    warn!(
                        task_id = %task.task_id,
                        attempt = attempts,
                        "Retrying task {} for the {} time due to {}",
                        task.task_id,
                        ordinal(attempts),
                        failure
                    );
                    let interrupted = failure.is_interrupt();
                    failures.push(failure.to_string());
                    if interrupted && interrupts.confirm_stop().await {
                        return TaskRun::Stopped;
                    }
                }
            }
        }

        if answer.is_empty() {
            warn!(
                task_id = %task.task_id,
                attempts,
                "No answer after {} attempts; recording empty answer",
                attempts
            );
        }

        TaskRun::Completed(TaskOutcome {
            task_id: task.task_id.clone(),
            tier,
            answer,
            attempts,
            duration: start.elapsed(),
            failures,
        })
    }

    /// One agent invocation followed by answer validation.
    async fn attempt(
        &self,
        task: &Task,
        paths: &TaskPaths,
        interrupts: &mut Interrupts,
    ) -> Result<String, AttemptFailure> {
        let query = build_query(task, &paths.output);

        match tokio::fs::remove_file(&paths.output).await {
            Ok(()) => debug!(path = %paths.output.display(), "Removed stale output file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %paths.output.display(), error = %e, "Failed to remove stale output"),
        }

        let log = AttemptLog::open(&paths.log).map_err(AttemptFailure::LogUnavailable)?;
        log.info(format_args!("Starting serving the query: {}", query));

        let started = Instant::now();
        let result = self.invoke(task, &query, paths, &log, interrupts).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(output) if output.is_success() => {
                log.info(format_args!("Query served in {:.2}s.", elapsed));
            }
            Ok(output) => {
                log.warn(format_args!(
                    "Agent exited with code {} after {:.2}s.",
                    output.exit_code, elapsed
                ));
            }
            Err(AgentError::Interrupted) => log.warn("Operation interrupted."),
            Err(e) => log.error(format_args!(
                "Failed to serve query due to {} after {:.2}s",
                e, elapsed
            )),
        }
        if let Err(e) = log.close() {
            warn!(path = %paths.log.display(), error = %e, "Failed to close attempt log");
        }

        result?;
        read_answer(&paths.output).await
    }

    /// Calls the adapter, racing it against Ctrl-C when enabled.
    async fn invoke(
        &self,
        task: &Task,
        query: &str,
        paths: &TaskPaths,
        log: &AttemptLog,
        interrupts: &mut Interrupts,
    ) -> Result<AgentOutput, AgentError> {
        let request = AgentRequest {
            task_id: &task.task_id,
            query,
            output_path: &paths.output,
            log,
            timeout: self.config.agent_timeout(),
        };

        if !interrupts.is_enabled() {
            return self.adapter.run(request).await;
        }

        tokio::select! {
            result = self.adapter.run(request) => result,
            // Dropping the adapter future kills the agent process.
            _ = interrupts.next() => Err(AgentError::Interrupted),
        }
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, r) if r != 11 => "st",
        (2, r) if r != 12 => "nd",
        (3, r) if r != 13 => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Error types for the runner.
///
/// Only setup and persistence problems end a run; agent failures never do.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Result store error: {0}")]
    Store(#[from] ResultStoreError),
}
