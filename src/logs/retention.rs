//! Time-window retention for agent log files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::parser::{LogRecord, RecordParser};
use crate::error::LogFilterError;

/// File extension of the logs mirrored by [`filter_log_tree`].
pub const LOG_EXTENSION: &str = "log";

/// Keeps records stamped at or after a cutoff instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    cutoff: NaiveDateTime,
}

impl RetentionWindow {
    pub fn new(cutoff: NaiveDateTime) -> Self {
        Self { cutoff }
    }

    /// Parses a cutoff such as `2025-04-27 14:10:00`, `2025-04-27T14:10:00.250`
    /// or a bare date (midnight).
    pub fn parse(raw: &str) -> Result<Self, LogFilterError> {
        let raw = raw.trim();
        const FORMATS: [&str; 4] = [
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
        ];
        for format in FORMATS {
            if let Ok(cutoff) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Self::new(cutoff));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Self::new)
            .ok_or_else(|| LogFilterError::InvalidCutoff(raw.to_string()))
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    /// Inclusive: a record stamped exactly at the cutoff is kept.
    pub fn retains(&self, record: &LogRecord) -> bool {
        record.timestamp >= self.cutoff
    }
}

/// Counters for one filtered stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub records: usize,
    pub retained: usize,
    pub dropped: usize,
    /// Lines before the first record, which are always discarded.
    pub orphan_lines: usize,
}

/// Copies the records of `reader` that fall inside `window` to `writer`,
/// verbatim and in order.
pub fn filter_records<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    window: &RetentionWindow,
) -> Result<FilterStats, LogFilterError> {
    let mut stats = FilterStats::default();
    let mut parser = RecordParser::new(reader);

    for record in parser.by_ref() {
        let record = record?;
        stats.records += 1;
        if window.retains(&record) {
            stats.retained += 1;
            for line in &record.lines {
                writer.write_all(line.as_bytes())?;
            }
        } else {
            stats.dropped += 1;
        }
    }

    stats.orphan_lines = parser.orphan_lines();
    Ok(stats)
}

/// Filters `src` into `dst`, creating parent directories as needed.
///
/// Output goes to a temporary file next to `dst` and is renamed into place
/// only on success, so a failed file never leaves a partial copy behind.
pub fn filter_log_file(
    src: &Path,
    dst: &Path,
    window: &RetentionWindow,
) -> Result<FilterStats, LogFilterError> {
    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let reader = BufReader::new(File::open(src)?);
    let mut tmp = NamedTempFile::new_in(&parent)?;
    let stats = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let stats = filter_records(reader, &mut writer, window)?;
        writer.flush()?;
        stats
    };
    tmp.persist(dst).map_err(|e| e.error)?;

    if stats.orphan_lines > 0 {
        warn!(
            file = %src.display(),
            lines = stats.orphan_lines,
            "Dropped lines preceding the first log record"
        );
    }
    debug!(
        file = %src.display(),
        retained = stats.retained,
        dropped = stats.dropped,
        "Filtered log file"
    );
    Ok(stats)
}

/// Outcome of one file in a tree pass.
#[derive(Debug)]
pub struct FileReport {
    /// Path relative to the source root.
    pub relative: PathBuf,
    pub result: Result<FilterStats, LogFilterError>,
}

/// Outcome of [`filter_log_tree`].
#[derive(Debug, Default)]
pub struct TreeReport {
    pub files: Vec<FileReport>,
}

impl TreeReport {
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.result.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Sum of the stats of every file that succeeded.
    pub fn totals(&self) -> FilterStats {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok())
            .fold(FilterStats::default(), |acc, s| FilterStats {
                records: acc.records + s.records,
                retained: acc.retained + s.retained,
                dropped: acc.dropped + s.dropped,
                orphan_lines: acc.orphan_lines + s.orphan_lines,
            })
    }
}

/// Mirrors every `*.log` file under `src_root` into `dst_root` at the same
/// relative path, keeping only records inside `window`.
///
/// A file that fails (e.g. on a malformed timestamp) is reported in the
/// returned [`TreeReport`] and does not stop the others. A missing source
/// root is an error.
pub fn filter_log_tree(
    src_root: &Path,
    dst_root: &Path,
    window: &RetentionWindow,
) -> Result<TreeReport, LogFilterError> {
    if !src_root.is_dir() {
        return Err(LogFilterError::SourceNotFound(src_root.to_path_buf()));
    }

    let mut report = TreeReport::default();
    for entry in WalkDir::new(src_root).sort_by_file_name() {
        let entry = entry.map_err(|source| LogFilterError::Walk {
            path: src_root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !is_log_file(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(src_root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let dst = dst_root.join(&relative);
        let result = filter_log_file(entry.path(), &dst, window);
        if let Err(e) = &result {
            warn!(file = %entry.path().display(), error = %e, "Skipping log file");
        }
        report.files.push(FileReport { relative, result });
    }

    let totals = report.totals();
    info!(
        files = report.files.len(),
        failed = report.failed_count(),
        retained = totals.retained,
        dropped = totals.dropped,
        cutoff = %window.cutoff(),
        "Log retention pass finished"
    );
    Ok(report)
}

fn is_log_file(path: &Path) -> bool {
    path.extension().map(|e| e == LOG_EXTENSION).unwrap_or(false)
}
