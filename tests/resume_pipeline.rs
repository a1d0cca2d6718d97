//! End-to-end runs of the benchmark runner with a scripted agent.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_bench::dataset::{LocalDataset, Task, TaskSource, Tier};
use agent_bench::error::DatasetError;
use agent_bench::runner::{
    AgentAdapter, AgentError, AgentOutput, AgentRequest, BenchmarkRunner, RunConfig,
};
use agent_bench::storage::{load_resume_state, ResultRecord};
use async_trait::async_trait;
use tempfile::TempDir;

#[derive(Clone)]
enum Step {
    Answer(&'static str),
    Write(&'static str),
    Nothing,
    Error,
    Interrupted,
}

/// Agent whose behaviour is scripted per task id.
#[derive(Default)]
struct ScriptedAgent {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedAgent {
    fn script(self, task_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
        self
    }

    fn calls_for(&self, task_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == task_id)
            .count()
    }

    fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, q)| q.clone()).collect()
    }
}

#[async_trait]
impl AgentAdapter for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.task_id.to_string(), request.query.to_string()));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(request.task_id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Nothing);

        request.log.info(format_args!("working on {}", request.task_id));
        match step {
            Step::Answer(answer) => std::fs::write(
                request.output_path,
                format!("Some reasoning.\nFINAL ANSWER: {}\n", answer),
            )?,
            Step::Write(text) => std::fs::write(request.output_path, text)?,
            Step::Nothing => {}
            Step::Error => return Err(AgentError::ExecutionFailed("model overloaded".into())),
            Step::Interrupted => return Err(AgentError::Interrupted),
        }
        Ok(AgentOutput::new(0, Duration::from_millis(5)))
    }
}

/// In-memory task source.
struct StaticTasks(HashMap<Tier, Vec<Task>>);

impl TaskSource for StaticTasks {
    fn tasks(&self, tier: Tier) -> Result<Vec<Task>, DatasetError> {
        Ok(self.0.get(&tier).cloned().unwrap_or_default())
    }
}

fn level1(ids: &[&str]) -> StaticTasks {
    let tasks = ids
        .iter()
        .map(|id| Task::new(*id, format!("Question for {}", id)))
        .collect();
    StaticTasks(HashMap::from([(Tier::Level1, tasks)]))
}

fn config(root: &Path) -> RunConfig {
    RunConfig::new("validation")
        .with_tiers(vec![Tier::Level1])
        .with_log_root(root.join("logs"))
        .with_result_file(root.join("gaia_validation.jsonl"))
        .with_interrupt_handling(false)
}

fn read_records(path: &Path) -> Vec<ResultRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_run_records_one_line_per_task() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(
        ScriptedAgent::default()
            .script("t1", vec![Step::Answer("42")])
            .script("t2", vec![Step::Error, Step::Write("no marker"), Step::Answer("Paris")])
            .script("t3", vec![Step::Nothing, Step::Nothing, Step::Nothing, Step::Answer("late")]),
    );
    let runner = BenchmarkRunner::new(config(temp.path()), agent.clone()).unwrap();

    let summary = runner.run(&level1(&["t1", "t2", "t3"])).await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.answered, 2);
    assert_eq!(summary.unanswered, 1);
    assert_eq!(summary.attempts, 1 + 3 + 3);
    assert!(!summary.stopped_early);

    // retry limit bounds invocations, even though a 4th attempt would succeed
    assert_eq!(agent.calls_for("t3"), 3);

    let records = read_records(&temp.path().join("gaia_validation.jsonl"));
    assert_eq!(
        records,
        vec![
            ResultRecord::new("t1", "42"),
            ResultRecord::new("t2", "Paris"),
            ResultRecord::new("t3", ""),
        ]
    );
}

#[tokio::test]
async fn test_id_repeated_across_tiers_recorded_once() {
    let temp = TempDir::new().unwrap();
    let tasks = StaticTasks(HashMap::from([
        (Tier::Level1, vec![Task::new("t1", "first"), Task::new("t2", "q")]),
        (Tier::Level2, vec![Task::new("t1", "again"), Task::new("t3", "q")]),
    ]));
    let agent = Arc::new(
        ScriptedAgent::default()
            .script("t1", vec![Step::Answer("one"), Step::Answer("two")])
            .script("t2", vec![Step::Answer("b")])
            .script("t3", vec![Step::Answer("c")]),
    );
    let cfg = config(temp.path()).with_tiers(vec![Tier::Level1, Tier::Level2]);
    let runner = BenchmarkRunner::new(cfg, agent.clone()).unwrap();

    let summary = runner.run(&tasks).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(agent.calls_for("t1"), 1);

    let records = read_records(&temp.path().join("gaia_validation.jsonl"));
    let ids: Vec<_> = records.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
    assert_eq!(records[0].model_answer, "one");
}

#[tokio::test]
async fn test_interrupted_attempt_counts_as_failure() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(
        ScriptedAgent::default().script("t1", vec![Step::Interrupted, Step::Answer("42")]),
    );
    let runner = BenchmarkRunner::new(config(temp.path()), agent.clone()).unwrap();

    let summary = runner.run(&level1(&["t1"])).await.unwrap();
    assert_eq!(summary.attempts, 2);
    assert_eq!(summary.answered, 1);
    assert!(!summary.stopped_early);
    assert_eq!(agent.calls_for("t1"), 2);
    assert_eq!(
        read_records(&temp.path().join("gaia_validation.jsonl")),
        vec![ResultRecord::new("t1", "42")]
    );
}

#[tokio::test]
async fn test_rerun_skips_recorded_tasks() {
    let temp = TempDir::new().unwrap();
    let tasks = level1(&["t1", "t2"]);

    let first = Arc::new(ScriptedAgent::default().script("t1", vec![Step::Answer("a")]));
    let runner = BenchmarkRunner::new(config(temp.path()), first).unwrap();
    runner.run(&tasks).await.unwrap();

    let second = Arc::new(ScriptedAgent::default());
    let runner = BenchmarkRunner::new(config(temp.path()), second.clone()).unwrap();
    let summary = runner.run(&tasks).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 2);
    assert!(second.queries().is_empty());

    let state = load_resume_state(&temp.path().join("gaia_validation.jsonl"))
        .await
        .unwrap();
    assert_eq!(state.records, 2);
    assert_eq!(state.empty_answers, 1);
}

#[tokio::test]
async fn test_resume_after_partial_store() {
    let temp = TempDir::new().unwrap();
    let result_file = temp.path().join("gaia_validation.jsonl");
    // a killed run left one good line and one torn line
    std::fs::write(&result_file, "{\"task_id\":\"t1\",\"model_answer\":\"7\"}\n{\"task_id\":\"t2\",\"mod").unwrap();

    let agent = Arc::new(
        ScriptedAgent::default()
            .script("t2", vec![Step::Answer("8")])
            .script("t3", vec![Step::Answer("9")]),
    );
    let runner = BenchmarkRunner::new(config(temp.path()), agent.clone()).unwrap();
    let summary = runner.run(&level1(&["t1", "t2", "t3"])).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(agent.calls_for("t1"), 0);

    let state = load_resume_state(&result_file).await.unwrap();
    assert_eq!(state.malformed, 1);
    assert!(state.contains("t1") && state.contains("t2") && state.contains("t3"));
    assert_eq!(state.records, 3);
}

#[tokio::test]
async fn test_task_files_and_query() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(ScriptedAgent::default().script("t1", vec![Step::Error, Step::Answer("x")]));
    let runner = BenchmarkRunner::new(config(temp.path()), agent.clone()).unwrap();
    runner.run(&level1(&["t1"])).await.unwrap();

    let dir = temp.path().join("logs").join("validation-level1");
    let output = dir.join("t1.txt");
    let log = std::fs::read_to_string(dir.join("t1.log")).unwrap();
    assert_eq!(log.matches("Starting serving the query").count(), 2);
    assert!(log.contains("working on t1"));
    assert!(log.contains("Failed to serve query due to"));

    let queries = agent.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0], queries[1]);
    assert!(queries[0].starts_with("Your task is: Question for t1"));
    assert!(queries[0].contains(&output.display().to_string()));
}

#[tokio::test]
async fn test_local_dataset_end_to_end() {
    let temp = TempDir::new().unwrap();
    let split_dir = temp.path().join("data").join("validation");
    std::fs::create_dir_all(&split_dir).unwrap();
    std::fs::write(
        split_dir.join("level1.jsonl"),
        "{\"task_id\":\"a\",\"Question\":\"What is in the sheet?\",\"file_name\":\"s.xlsx\",\"file_path\":\"files/s.xlsx\"}\n\
         {\"task_id\":\"b\",\"Question\":\"Plain question\",\"file_name\":\"\"}\n",
    )
    .unwrap();

    let agent = Arc::new(
        ScriptedAgent::default()
            .script("a", vec![Step::Answer("12")])
            .script("b", vec![Step::Answer("no")]),
    );
    let cfg = config(temp.path()).with_dataset_dir(temp.path().join("data"));
    let dataset = LocalDataset::new(&cfg.dataset_dir, &cfg.split);
    let runner = BenchmarkRunner::new(cfg, agent.clone()).unwrap();
    let summary = runner.run(&dataset).await.unwrap();
    assert_eq!(summary.answered, 2);

    let queries = agent.queries();
    let attachment = split_dir.join("files").join("s.xlsx");
    assert!(queries[0].contains(&format!(
        "{} is the absolute file path you need to use.",
        attachment.display()
    )));
    assert!(!queries[1].contains("absolute file path you need to use"));
}

#[tokio::test]
async fn test_missing_tier_file_fails_run() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path()).with_dataset_dir(temp.path().join("nowhere"));
    let dataset = LocalDataset::new(&cfg.dataset_dir, &cfg.split);
    let runner = BenchmarkRunner::new(cfg, Arc::new(ScriptedAgent::default())).unwrap();

    assert!(runner.run(&dataset).await.is_err());
}
