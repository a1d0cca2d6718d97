//! Command-line interface for agent-bench.
//!
//! Provides commands for running benchmarks, trimming agent logs and
//! inspecting the result store.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
