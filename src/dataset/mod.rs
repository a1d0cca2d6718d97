//! Benchmark task source.
//!
//! Tasks are grouped by difficulty [`Tier`] and handed to the runner in a
//! fixed order. Where they come from is behind the [`TaskSource`] trait; the
//! crate ships a [`LocalDataset`] that reads a GAIA-style export from disk.

pub mod local;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

pub use local::LocalDataset;

/// Difficulty tier of a benchmark task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Level1,
    Level2,
    Level3,
}

impl Tier {
    /// All tiers, in processing order.
    pub const ALL: [Tier; 3] = [Tier::Level1, Tier::Level2, Tier::Level3];

    /// Returns the on-disk name of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Level1 => "level1",
            Tier::Level2 => "level2",
            Tier::Level3 => "level3",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "level1" | "1" => Ok(Tier::Level1),
            "level2" | "2" => Ok(Tier::Level2),
            "level3" | "3" => Ok(Tier::Level3),
            other => Err(format!("Unknown tier: {}", other)),
        }
    }
}

/// Parses a comma-separated tier list such as `level1,level3`.
pub fn parse_tiers(raw: &str) -> Result<Vec<Tier>, String> {
    let mut tiers = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let tier: Tier = part.parse()?;
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }
    Ok(tiers)
}

/// One benchmark question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier, unique within a run.
    pub task_id: String,
    /// The question put to the agent.
    #[serde(alias = "Question")]
    pub question: String,
    /// Name of the attached file, empty when the task has none.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Location of the attached file.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Task {
    /// Creates a task without an attachment.
    pub fn new(task_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            question: question.into(),
            file_name: None,
            file_path: None,
        }
    }

    /// Attaches a file to the task.
    pub fn with_attachment(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.file_name = Some(name.into());
        self.file_path = Some(path.into());
        self
    }

    /// Returns the attachment path if the task declares a non-empty file name.
    pub fn attachment(&self) -> Option<&PathBuf> {
        match self.file_name.as_deref() {
            Some(name) if !name.trim().is_empty() => self.file_path.as_ref(),
            _ => None,
        }
    }
}

/// Supplies the ordered tasks of one tier.
///
/// Implementations must return the same tasks in the same order on every
/// call for a given tier, so a resumed run sees the same sequence.
pub trait TaskSource: Send + Sync {
    /// Returns the tasks of `tier` in processing order.
    fn tasks(&self, tier: Tier) -> Result<Vec<Task>, DatasetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_from_str() {
        assert_eq!("level1".parse::<Tier>().unwrap(), Tier::Level1);
        assert_eq!("LEVEL2".parse::<Tier>().unwrap(), Tier::Level2);
        assert_eq!("3".parse::<Tier>().unwrap(), Tier::Level3);
        assert!("level4".parse::<Tier>().is_err());
    }

    #[test]
    fn test_parse_tiers_dedups_and_keeps_order() {
        let tiers = parse_tiers("level3, level1,level3").unwrap();
        assert_eq!(tiers, vec![Tier::Level3, Tier::Level1]);
    }

    #[test]
    fn test_task_attachment_requires_file_name() {
        let mut task = Task::new("t1", "q").with_attachment("data.csv", "/tmp/data.csv");
        assert_eq!(task.attachment(), Some(&PathBuf::from("/tmp/data.csv")));

        task.file_name = Some(String::new());
        assert!(task.attachment().is_none());
    }

    #[test]
    fn test_task_deserializes_gaia_fields() {
        let raw = r#"{"task_id":"abc","Question":"What?","Level":"1","file_name":"","file_path":""}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.task_id, "abc");
        assert_eq!(task.question, "What?");
        assert!(task.attachment().is_none());
    }
}
