//! Local dataset provider.
//!
//! Reads tasks from `{root}/{split}/{tier}.jsonl` (one task per line) or,
//! when no JSONL file exists, `{root}/{split}/{tier}.json` (a JSON array).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Task, TaskSource, Tier};
use crate::error::DatasetError;

/// A GAIA-style dataset exported to the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDataset {
    root: PathBuf,
    split: String,
}

impl LocalDataset {
    /// Creates a provider for `split` (e.g. `validation`) under `root`.
    pub fn new(root: impl Into<PathBuf>, split: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            split: split.into(),
        }
    }

    /// Directory holding the tier files of this split.
    pub fn split_dir(&self) -> PathBuf {
        self.root.join(&self.split)
    }

    fn load_jsonl(&self, path: &Path) -> Result<Vec<Task>, DatasetError> {
        let content = fs::read_to_string(path)?;
        let mut tasks = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let task = serde_json::from_str::<Task>(line).map_err(|source| {
                DatasetError::MalformedTask {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    source,
                }
            })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn load_json(&self, path: &Path) -> Result<Vec<Task>, DatasetError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolves relative attachment paths against the split directory.
    fn resolve_attachments(&self, tasks: &mut [Task]) {
        let base = self.split_dir();
        for task in tasks.iter_mut() {
            if let Some(path) = task.file_path.as_mut() {
                if !path.as_os_str().is_empty() && path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

impl TaskSource for LocalDataset {
    fn tasks(&self, tier: Tier) -> Result<Vec<Task>, DatasetError> {
        let dir = self.split_dir();
        let jsonl = dir.join(format!("{}.jsonl", tier));
        let json = dir.join(format!("{}.json", tier));

        let mut tasks = if jsonl.is_file() {
            self.load_jsonl(&jsonl)?
        } else if json.is_file() {
            self.load_json(&json)?
        } else {
            return Err(DatasetError::TierNotFound {
                tier: tier.to_string(),
                dir,
            });
        };

        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.task_id.as_str()) {
                return Err(DatasetError::DuplicateTask(task.task_id.clone()));
            }
        }

        self.resolve_attachments(&mut tasks);
        debug!(tier = %tier, count = tasks.len(), dir = %dir.display(), "Loaded tasks");
        Ok(tasks)
    }
}
