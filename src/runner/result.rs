//! Outcomes of attempts, tasks and whole runs.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agents::AgentError;
use crate::dataset::Tier;
use crate::storage::ResultRecord;

/// Why an attempt did not yield an answer.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    #[error("error {0}")]
    Agent(#[from] AgentError),

    #[error("no output file generated at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("output file could not be read: {0}")]
    UnreadableOutput(std::io::Error),

    #[error("final answer marker cannot be found in the output file")]
    MissingMarker,

    #[error("final answer in the output file is empty")]
    EmptyAnswer,

    #[error("attempt log could not be opened: {0}")]
    LogUnavailable(std::io::Error),
}

impl AttemptFailure {
    /// Whether the failure came from an operator interrupt.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, AttemptFailure::Agent(AgentError::Interrupted))
    }
}

/// Final state of one task in this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub tier: Tier,
    /// Extracted answer; empty when every attempt failed.
    pub answer: String,
    /// Number of agent invocations made.
    pub attempts: u32,
    pub duration: Duration,
    /// One message per failed attempt, in order.
    pub failures: Vec<String>,
}

impl TaskOutcome {
    pub fn is_answered(&self) -> bool {
        !self.answer.is_empty()
    }

    /// The line persisted to the result store.
    pub fn record(&self) -> ResultRecord {
        ResultRecord::new(self.task_id.clone(), self.answer.clone())
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Tasks attempted and recorded in this run.
    pub processed: usize,
    /// Tasks skipped because the result store already had them.
    pub skipped: usize,
    pub answered: usize,
    pub unanswered: usize,
    /// Agent invocations across all tasks.
    pub attempts: u64,
    pub duration: Duration,
    /// Set when the operator stopped the run before all tasks were seen.
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            processed: 0,
            skipped: 0,
            answered: 0,
            unanswered: 0,
            attempts: 0,
            duration: Duration::ZERO,
            stopped_early: false,
        }
    }

    /// Adds a recorded task to the counters.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.processed += 1;
        self.attempts += u64::from(outcome.attempts);
        if outcome.is_answered() {
            self.answered += 1;
        } else {
            self.unanswered += 1;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: processed={} skipped={} answered={} unanswered={} attempts={} duration={:.1}s{}",
            self.run_id,
            self.processed,
            self.skipped,
            self.answered,
            self.unanswered,
            self.attempts,
            self.duration.as_secs_f64(),
            if self.stopped_early { " (stopped early)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(answer: &str, attempts: u32) -> TaskOutcome {
        TaskOutcome {
            task_id: "t".into(),
            tier: Tier::Level1,
            answer: answer.into(),
            attempts,
            duration: Duration::from_secs(1),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new("run-1");
        summary.record(&outcome("42", 1));
        summary.record(&outcome("", 3));

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.answered, 1);
        assert_eq!(summary.unanswered, 1);
        assert_eq!(summary.attempts, 4);
    }

    #[test]
    fn test_failure_messages() {
        let failure = AttemptFailure::MissingOutput(PathBuf::from("/x/t.txt"));
        assert_eq!(failure.to_string(), "no output file generated at /x/t.txt");

        let interrupted = AttemptFailure::from(AgentError::Interrupted);
        assert!(interrupted.is_interrupt());
        assert_eq!(interrupted.to_string(), "error Operation interrupted");
    }

    #[test]
    fn test_outcome_record() {
        let record = outcome("", 3).record();
        assert_eq!(record.task_id, "t");
        assert!(record.is_empty());
    }
}
