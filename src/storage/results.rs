//! Append-only JSONL result store.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::ResultStoreError;

/// Outcome of one task, as persisted in the result store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    /// Extracted answer; empty when every attempt failed.
    pub model_answer: String,
}

impl ResultRecord {
    pub fn new(task_id: impl Into<String>, model_answer: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            model_answer: model_answer.into(),
        }
    }

    /// Whether the task was recorded without an answer.
    pub fn is_empty(&self) -> bool {
        self.model_answer.is_empty()
    }
}

/// Resume state reconstructed from an existing result store.
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    /// Task ids that already have a record.
    pub processed: HashSet<String>,
    /// Number of well-formed lines, duplicates included.
    pub records: usize,
    /// Number of records whose answer is empty.
    pub empty_answers: usize,
    /// Number of lines that could not be parsed and were skipped.
    pub malformed: usize,
}

impl ResumeState {
    pub fn contains(&self, task_id: &str) -> bool {
        self.processed.contains(task_id)
    }

    /// Marks a task as processed for the rest of the run.
    pub fn insert(&mut self, task_id: impl Into<String>) -> bool {
        self.processed.insert(task_id.into())
    }
}

/// Only `task_id` is needed to resume; the answer is optional so older or
/// hand-edited lines still count.
#[derive(Deserialize)]
struct StoredLine {
    task_id: String,
    #[serde(default)]
    model_answer: Option<String>,
}

/// Scans `path` and returns the ids already recorded.
///
/// A missing file yields an empty state. Blank and malformed lines are
/// skipped, so a torn trailing line from a killed run never blocks resuming.
pub async fn load_resume_state(path: &Path) -> Result<ResumeState, ResultStoreError> {
    // Bytes, not a String: a torn tail can end inside a multi-byte character.
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No result store yet");
            return Ok(ResumeState::default());
        }
        Err(source) => {
            return Err(ResultStoreError::Open {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut state = ResumeState::default();
    for (idx, line) in content.split(|b| *b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<StoredLine>(line) {
            Ok(stored) => {
                state.records += 1;
                if stored.model_answer.as_deref().unwrap_or_default().is_empty() {
                    state.empty_answers += 1;
                }
                state.processed.insert(stored.task_id);
            }
            Err(e) => {
                state.malformed += 1;
                debug!(line = idx + 1, error = %e, "Skipping malformed result line");
            }
        }
    }

    info!(
        path = %path.display(),
        processed = state.processed.len(),
        malformed = state.malformed,
        "Loaded resume state"
    );
    Ok(state)
}

/// Append-only writer for [`ResultRecord`] lines.
///
/// Every [`append`](ResultStore::append) is flushed and synced before it
/// returns, so a killed process loses at most the task in flight.
pub struct ResultStore {
    path: PathBuf,
    file: File,
}

impl ResultStore {
    /// Opens (or creates) the store at `path` for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ResultStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ResultStoreError::Open {
                    path: path.clone(),
                    source,
                })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await
            .map_err(|source| ResultStoreError::Open {
                path: path.clone(),
                source,
            })?;

        if ends_with_partial_line(&mut file).await? {
            debug!(path = %path.display(), "Terminating torn trailing line");
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self { path, file })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single JSON line and syncs it to disk.
    pub async fn append(&mut self, record: &ResultRecord) -> Result<(), ResultStoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let wrap = |source: std::io::Error| ResultStoreError::Append {
            task_id: record.task_id.clone(),
            source,
        };
        self.file.write_all(line.as_bytes()).await.map_err(wrap)?;
        self.file.flush().await.map_err(wrap)?;
        self.file.sync_data().await.map_err(wrap)?;
        Ok(())
    }
}

async fn ends_with_partial_line(file: &mut File) -> Result<bool, ResultStoreError> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}
