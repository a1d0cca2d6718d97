//! Resumable benchmark runner.
//!
//! Drives an external agent over the tasks of a benchmark split and records
//! one answer per task in an append-only result store.
//!
//! # Architecture
//!
//! ```text
//! TaskSource → BenchmarkRunner → AgentAdapter → output file → answer → ResultStore
//!                                      ↓
//!                                 AttemptLog ({split}-{tier}/{task_id}.log)
//! ```
//!
//! The runner:
//! 1. Loads the set of already processed task ids from the result store
//! 2. Builds the query for each pending task
//! 3. Invokes the agent up to `retry_limit` times, stopping at the first valid answer
//! 4. Appends exactly one record per task, empty when no attempt succeeded
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agent_bench::dataset::LocalDataset;
//! use agent_bench::runner::{BenchmarkRunner, CommandAdapter, RunConfig};
//!
//! let config = RunConfig::new("validation").with_retry_limit(3);
//! let adapter = Arc::new(CommandAdapter::from_config(&config));
//! let dataset = LocalDataset::new(&config.dataset_dir, &config.split);
//!
//! let runner = BenchmarkRunner::new(config, adapter)?;
//! let summary = runner.run(&dataset).await?;
//! println!("{}", summary);
//! ```

pub mod agents;
pub mod answer;
pub mod config;
pub mod executor;
pub mod interrupt;
pub mod log_sink;
pub mod query;
pub mod result;

pub use agents::{AgentAdapter, AgentError, AgentOutput, AgentRequest, CommandAdapter};
pub use answer::{extract_answer, read_answer, ANSWER_MARKER};
pub use config::RunConfig;
pub use executor::{BenchmarkRunner, RunnerError, TaskPaths};
pub use interrupt::Interrupts;
pub use log_sink::AttemptLog;
pub use query::build_query;
pub use result::{AttemptFailure, RunSummary, TaskOutcome};
