//! Per-attempt agent log.
//!
//! Each attempt gets its own [`AttemptLog`] handle, passed explicitly to the
//! agent adapter and closed when the attempt ends. Nothing is registered in
//! process-wide logging state, so two attempts can never write into each
//! other's file.
//!
//! Lines follow the format consumed by [`crate::logs::parser`]:
//!
//! ```text
//! [INFO][2025-04-27 14:10:00.123][4242][executor.rs:210]: message
//! ```

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::Level;

/// Timestamp layout of a log line; must agree with the record parser.
const LINE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Append-mode log file owned by a single attempt.
pub struct AttemptLog {
    path: PathBuf,
    pid: u32,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl AttemptLog {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            pid: std::process::id(),
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record stamped with the caller's source location.
    ///
    /// Multi-line messages become continuation lines of the same record.
    /// Write failures are reported through `tracing` and otherwise ignored;
    /// a broken log must not fail the attempt.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Display) {
        let location = Location::caller();
        let line = format_line(level, self.pid, location, &message);

        let mut guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(writer) = guard.as_mut() else {
            tracing::debug!(path = %self.path.display(), "Attempt log already closed");
            return;
        };
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write attempt log");
        }
    }

    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.log(Level::INFO, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Display) {
        self.log(Level::WARN, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.log(Level::ERROR, message);
    }

    /// Flushes and detaches the file.
    pub fn close(self) -> io::Result<()> {
        self.detach()
    }

    fn detach(&self) -> io::Result<()> {
        let mut guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AttemptLog {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to flush attempt log");
        }
    }
}

fn format_line(level: Level, pid: u32, location: &Location<'_>, message: &dyn Display) -> String {
    let file = Path::new(location.file())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.file().to_string());
    let mut line = format!(
        "[{}][{}][{}][{}:{}]: {}",
        level,
        Local::now().format(LINE_TIMESTAMP),
        pid,
        file,
        location.line(),
        message
    );
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{RecordParser, BOUNDARY};
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_lines_match_record_boundary() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("logs").join("t1.log");

        let log = AttemptLog::open(&path).expect("open log");
        log.info("Starting serving the query: hello");
        log.error("Failed to serve query due to boom\nTraceback line 1\nTraceback line 2");
        log.close().expect("close log");

        let content = fs::read_to_string(&path).unwrap();
        let first = content.lines().next().unwrap();
        assert!(BOUNDARY.is_match(first), "unexpected line: {}", first);
        assert!(first.starts_with("[INFO]["));
        assert!(first.contains("[log_sink.rs:"));

        let records = RecordParser::new(Cursor::new(content.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .expect("parse own output");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].level, "ERROR");
        assert_eq!(records[1].continuation_count(), 2);
    }

    #[test]
    fn test_reopen_appends() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("t1.log");

        let first = AttemptLog::open(&path).unwrap();
        first.warn("attempt one");
        drop(first);

        let second = AttemptLog::open(&path).unwrap();
        second.info("attempt two");
        second.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().starts_with("[WARN]"));
    }

    #[test]
    fn test_location_is_callers() {
        let location = Location::caller();
        let line = format_line(Level::INFO, 7, location, &"x");
        assert!(line.contains("[7][log_sink.rs:"));
        assert!(line.ends_with(": x\n"));
    }
}
