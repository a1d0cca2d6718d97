//! CLI command definitions for agent-bench.
//!
//! Three subcommands: `run` drives an agent over a benchmark split,
//! `trim-logs` rewrites a log tree keeping only recent records, and
//! `status` reports what the result store already holds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::dataset::{parse_tiers, LocalDataset, Tier};
use crate::logs::{filter_log_tree, RetentionWindow};
use crate::runner::{BenchmarkRunner, CommandAdapter, RunConfig};
use crate::storage::load_resume_state;

/// Default source root for `trim-logs`.
const DEFAULT_LOG_SRC: &str = "logs";

/// Default destination root for `trim-logs`.
const DEFAULT_LOG_DST: &str = "new-logs";

/// Resumable benchmark runner for tool-using agents.
#[derive(Parser)]
#[command(name = "agent-bench")]
#[command(about = "Run an agent over GAIA-style benchmark tasks and manage its logs")]
#[command(version)]
#[command(
    long_about = "agent-bench runs an external agent over every task of a benchmark split, retrying failed attempts and recording one answer per task in a JSONL result store. Interrupted runs resume where they stopped.\n\nExample usage:\n  agent-bench run --split validation --tiers level1 --agent-cmd python --agent-arg main.py\n  agent-bench trim-logs --since \"2025-04-27 14:10:00\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the agent over every pending task of a split.
    Run(RunArgs),

    /// Copy a log tree keeping only records at or after a cutoff.
    #[command(name = "trim-logs")]
    TrimLogs(TrimLogsArgs),

    /// Show what the result store already holds.
    Status(StatusArgs),
}

/// Arguments for `agent-bench run`.
///
/// Flags override the config file and `AGENT_BENCH_*` variables.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset split (validation or test).
    #[arg(short, long)]
    pub split: Option<String>,

    /// Comma-separated tiers, e.g. level1,level2.
    #[arg(short, long)]
    pub tiers: Option<String>,

    /// Root of the local dataset export.
    #[arg(long)]
    pub dataset_dir: Option<PathBuf>,

    /// JSONL result store. Defaults to gaia_{split}.jsonl.
    #[arg(short, long)]
    pub result_file: Option<PathBuf>,

    /// Root directory for per-task logs and output files.
    #[arg(long)]
    pub log_root: Option<PathBuf>,

    /// Maximum attempts per task.
    #[arg(long)]
    pub retry_limit: Option<u32>,

    /// Per-attempt timeout in seconds.
    #[arg(long)]
    pub agent_timeout: Option<u64>,

    /// Agent executable.
    #[arg(long)]
    pub agent_cmd: Option<String>,

    /// Argument for the agent executable (repeatable).
    #[arg(long = "agent-arg", allow_hyphen_values = true)]
    pub agent_args: Vec<String>,

    /// Working directory for the agent process.
    #[arg(long)]
    pub agent_dir: Option<PathBuf>,
}

/// Arguments for `agent-bench trim-logs`.
#[derive(Parser, Debug)]
pub struct TrimLogsArgs {
    /// Cutoff, e.g. "2025-04-27 14:10:00". Records stamped earlier are dropped.
    #[arg(long)]
    pub since: String,

    /// Log tree to read.
    #[arg(long, default_value = DEFAULT_LOG_SRC)]
    pub src: PathBuf,

    /// Directory to write filtered logs to.
    #[arg(long, default_value = DEFAULT_LOG_DST)]
    pub dst: PathBuf,
}

/// Arguments for `agent-bench status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// JSONL result store to inspect.
    #[arg(short, long)]
    pub result_file: Option<PathBuf>,

    /// Split whose default result store is inspected.
    #[arg(short, long, default_value = "validation")]
    pub split: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_benchmark_command(args).await,
        Commands::TrimLogs(args) => run_trim_logs_command(args),
        Commands::Status(args) => run_status_command(args).await,
    }
}

// ============================================================================
// Run
// ============================================================================

/// Builds the effective configuration: file, then environment, then flags.
fn resolve_run_config<F>(args: RunArgs, lookup: F) -> anyhow::Result<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    config = config.apply_env(lookup)?;

    if let Some(split) = args.split {
        config.split = split;
    }
    if let Some(raw) = args.tiers {
        config.tiers = parse_tiers(&raw).map_err(|e| anyhow::anyhow!("Invalid --tiers: {}", e))?;
    }
    if let Some(dir) = args.dataset_dir {
        config.dataset_dir = dir;
    }
    if let Some(path) = args.result_file {
        config.result_file = Some(path);
    }
    if let Some(dir) = args.log_root {
        config.log_root = dir;
    }
    if let Some(limit) = args.retry_limit {
        config.retry_limit = limit;
    }
    if let Some(secs) = args.agent_timeout {
        config.agent_timeout_secs = secs;
    }
    if let Some(cmd) = args.agent_cmd {
        config.agent_command = cmd;
    }
    if !args.agent_args.is_empty() {
        config.agent_args = args.agent_args;
    }
    if let Some(dir) = args.agent_dir {
        config.agent_dir = Some(dir);
    }

    config.validate()?;
    Ok(config)
}

async fn run_benchmark_command(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_run_config(args, |key| std::env::var(key).ok())?;

    if let Some(dir) = &config.agent_dir {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Agent directory does not exist: {}",
                dir.display()
            ));
        }
    }

    let dataset = LocalDataset::new(&config.dataset_dir, &config.split);
    let adapter = Arc::new(CommandAdapter::from_config(&config));

    info!(
        split = %config.split,
        tiers = %format_tiers(&config.tiers),
        retry_limit = config.retry_limit,
        "Running {} {} on {}",
        config.agent_command,
        config.agent_args.join(" "),
        dataset.split_dir().display()
    );

    let runner = BenchmarkRunner::new(config, adapter)?;
    let summary = runner
        .run(&dataset)
        .await
        .context("Benchmark run failed")?;

    println!("\n=== Benchmark Run ===");
    println!("Run id:      {}", summary.run_id);
    println!("Processed:   {}", summary.processed);
    println!("Skipped:     {}", summary.skipped);
    println!("Answered:    {}", summary.answered);
    println!("Unanswered:  {}", summary.unanswered);
    println!("Attempts:    {}", summary.attempts);
    println!("Duration:    {:.1}s", summary.duration.as_secs_f64());
    println!("Results:     {}", runner.config().result_path().display());
    if summary.stopped_early {
        println!("Stopped early; rerun the same command to resume.");
    }

    Ok(())
}

fn format_tiers(tiers: &[Tier]) -> String {
    tiers
        .iter()
        .map(Tier::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Trim logs
// ============================================================================

fn run_trim_logs_command(args: TrimLogsArgs) -> anyhow::Result<()> {
    let window = RetentionWindow::parse(&args.since)?;
    let report = filter_log_tree(&args.src, &args.dst, &window)
        .with_context(|| format!("Failed to filter logs under '{}'", args.src.display()))?;

    println!(
        "Done. Filtered logs written under '{}/'",
        args.dst.display()
    );
    for file in &report.files {
        match &file.result {
            Ok(stats) => println!(
                "  {} kept={} dropped={}",
                file.relative.display(),
                stats.retained,
                stats.dropped
            ),
            Err(e) => println!("  {} FAILED: {}", file.relative.display(), e),
        }
    }

    let failed = report.failed_count();
    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} log files could not be filtered",
            failed,
            report.files.len()
        ));
    }
    Ok(())
}

// ============================================================================
// Status
// ============================================================================

async fn run_status_command(args: StatusArgs) -> anyhow::Result<()> {
    let path = match args.result_file {
        Some(path) => path,
        None => RunConfig::new(args.split).result_path(),
    };
    print_status(&path).await
}

async fn print_status(path: &Path) -> anyhow::Result<()> {
    let state = load_resume_state(path)
        .await
        .with_context(|| format!("Failed to read result store '{}'", path.display()))?;

    println!("Result store:   {}", path.display());
    println!("Recorded tasks: {}", state.processed.len());
    println!("Empty answers:  {}", state.empty_answers);
    println!("Malformed lines:{}", state.malformed);
    Ok(())
}
