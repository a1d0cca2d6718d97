//! Durable run state.
//!
//! The result store is a JSONL file with one [`ResultRecord`] per completed
//! task. It doubles as the resume state: on startup the runner scans it with
//! [`load_resume_state`] and skips every task id it already contains.

pub mod results;

pub use results::{load_resume_state, ResultRecord, ResultStore, ResumeState};
