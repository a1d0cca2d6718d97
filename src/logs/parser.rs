//! Boundary-delimited log record parser.
//!
//! A record starts at a line of the form
//! `[LEVEL][YYYY-MM-DD HH:mm:ss.SSS][PID][file:line]: message` and runs until
//! the next such line or end of input. Every other line is a continuation of
//! the open record and is kept byte-for-byte, line terminator included.

use std::io::BufRead;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::LogFilterError;

/// Format of the timestamp embedded in a boundary line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Matches a record's first line. Group 1 is the level, group 2 the timestamp.
pub static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[([A-Z]+)\]\[([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3})\]\[\d+\]\[[^\]]+:\d+\]:\s?",
    )
    .expect("Invalid regex for log record boundary")
});

/// One timestamped, possibly multi-line, log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Level tag of the first line, e.g. `INFO`.
    pub level: String,
    /// Timestamp of the first line.
    pub timestamp: NaiveDateTime,
    /// 1-based line number of the first line in the input.
    pub start_line: usize,
    /// Raw lines, terminators included.
    pub lines: Vec<String>,
}

impl LogRecord {
    /// Number of continuation lines after the boundary line.
    pub fn continuation_count(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    /// The record exactly as it appeared in the input.
    pub fn raw(&self) -> String {
        self.lines.concat()
    }
}

/// Parses the timestamp text captured by [`BOUNDARY`].
pub fn parse_timestamp(text: &str, line: usize) -> Result<NaiveDateTime, LogFilterError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map_err(|source| {
        LogFilterError::InvalidTimestamp {
            text: text.to_string(),
            line,
            source,
        }
    })
}

/// Lazy, single-pass iterator of [`LogRecord`]s over a line stream.
///
/// Yields an error and stops at the first unreadable line or unparsable
/// timestamp. Lines seen before the first boundary belong to no record; they
/// are dropped and counted in [`orphan_lines`](RecordParser::orphan_lines).
pub struct RecordParser<R> {
    reader: R,
    open: Option<LogRecord>,
    line_no: usize,
    orphan_lines: usize,
    done: bool,
}

impl<R: BufRead> RecordParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            open: None,
            line_no: 0,
            orphan_lines: 0,
            done: false,
        }
    }

    /// Lines dropped so far because no record was open.
    pub fn orphan_lines(&self) -> usize {
        self.orphan_lines
    }

    /// Lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for RecordParser<R> {
    type Item = Result<LogRecord, LogFilterError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Ok(0) => {
                    self.done = true;
                    return self.open.take().map(Ok);
                }
                Ok(_) => {}
            }
            self.line_no += 1;

            let Some(caps) = BOUNDARY.captures(&line) else {
                match self.open.as_mut() {
                    Some(record) => record.lines.push(line),
                    None => self.orphan_lines += 1,
                }
                continue;
            };

            let timestamp = match parse_timestamp(&caps[2], self.line_no) {
                Ok(ts) => ts,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let record = LogRecord {
                level: caps[1].to_string(),
                timestamp,
                start_line: self.line_no,
                lines: vec![line],
            };
            if let Some(previous) = self.open.replace(record) {
                return Some(Ok(previous));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_all(input: &str) -> Vec<LogRecord> {
        RecordParser::new(Cursor::new(input))
            .collect::<Result<Vec<_>, _>>()
            .expect("parse should succeed")
    }

    #[test]
    fn test_boundary_matches_logger_format() {
        assert!(BOUNDARY.is_match("[INFO][2025-04-27 14:09:59.000][1][a.py:1]: x"));
        assert!(BOUNDARY.is_match("[WARNING][2025-04-27 14:09:59.123][4242][manus.py:88]:"));
        assert!(BOUNDARY.is_match("[ERROR][2025-04-27 14:09:59.123][7][dir/run.rs:12]: boom"));
    }

    #[test]
    fn test_boundary_rejects_near_misses() {
        // lowercase level
        assert!(!BOUNDARY.is_match("[info][2025-04-27 14:09:59.000][1][a.py:1]: x"));
        // missing milliseconds
        assert!(!BOUNDARY.is_match("[INFO][2025-04-27 14:09:59][1][a.py:1]: x"));
        // non-numeric pid
        assert!(!BOUNDARY.is_match("[INFO][2025-04-27 14:09:59.000][pid][a.py:1]: x"));
        // missing separator
        assert!(!BOUNDARY.is_match("[INFO][2025-04-27 14:09:59.000][1][a.py:1] x"));
        // not at line start
        assert!(!BOUNDARY.is_match("  [INFO][2025-04-27 14:09:59.000][1][a.py:1]: x"));
    }

    #[test]
    fn test_splits_multiline_records() {
        let input = "[INFO][2025-04-27 14:09:59.000][1][a.py:1]: x\n\
                     [INFO][2025-04-27 14:10:00.000][1][a.py:2]: y\n\
                     Traceback (most recent call last):\n";
        let records = parse_all(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].continuation_count(), 0);
        assert_eq!(records[1].continuation_count(), 1);
        assert_eq!(records[1].start_line, 2);
        assert_eq!(
            records[1].timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "2025-04-27 14:10:00.000"
        );
    }

    #[test]
    fn test_preserves_raw_text() {
        let input = "[ERROR][2025-04-27 14:10:00.500][9][b.py:3]: failed\r\n  detail\r\n\n";
        let records = parse_all(input);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "ERROR");
        assert_eq!(records[0].raw(), input);
    }

    #[test]
    fn test_last_line_without_newline() {
        let input = "[INFO][2025-04-27 14:10:00.000][1][a.py:2]: y\ntail";
        let records = parse_all(input);
        assert_eq!(records[0].raw(), input);
    }

    #[test]
    fn test_counts_orphan_lines() {
        let input = "preamble\nmore preamble\n[INFO][2025-04-27 14:10:00.000][1][a.py:2]: y\n";
        let mut parser = RecordParser::new(Cursor::new(input));
        let first = parser.next().expect("one record").expect("valid record");
        assert_eq!(first.start_line, 3);
        assert!(parser.next().is_none());
        assert_eq!(parser.orphan_lines(), 2);
        assert_eq!(parser.lines_read(), 3);
    }

    #[test]
    fn test_invalid_timestamp_stops_stream() {
        let input = "[INFO][2025-04-27 14:10:00.000][1][a.py:2]: ok\n\
                     [INFO][2025-13-27 14:10:00.000][1][a.py:3]: bad month\n\
                     [INFO][2025-04-27 14:11:00.000][1][a.py:4]: never seen\n";
        let mut parser = RecordParser::new(Cursor::new(input));
        match parser.next() {
            Some(Err(LogFilterError::InvalidTimestamp { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected timestamp error, got {:?}", other),
        }
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_all("").is_empty());
    }
}
