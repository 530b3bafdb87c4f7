use std::io::BufRead;

use thiserror::Error;
use tracing::warn;

use crate::types::UpdateTuple;

const FIELDS_PER_LINE: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {FIELDS_PER_LINE} whitespace-separated fields, found {0}")]
    FieldCount(usize),

    #[error("{field} is not a hex object name: {value:?}")]
    InvalidCommitId { field: &'static str, value: String },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// A line that could not be turned into an [`UpdateTuple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the input.
    pub line_number: usize,
    pub content: String,
    pub reason: String,
}

/// Result of reading a whole update set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedUpdates {
    pub updates: Vec<UpdateTuple>,
    pub skipped: Vec<SkippedLine>,
}

/// Parse a single update line.
pub fn parse_update_line(line: &str) -> Result<UpdateTuple, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELDS_PER_LINE {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let local_commit = check_commit_id("local commit", fields[1])?;
    let remote_commit = check_commit_id("remote commit", fields[3])?;

    Ok(UpdateTuple::new(fields[0], local_commit, fields[2], remote_commit))
}

/// Read update lines until end of input.
///
/// Blank lines are ignored. Malformed lines are skipped with a warning and
/// do not affect the remaining lines; only an I/O failure aborts the read.
pub fn read_updates<R: BufRead>(mut reader: R) -> std::io::Result<ParsedUpdates> {
    let mut parsed = ParsedUpdates::default();
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        strip_line_ending(&mut buf);

        let result = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_update_line(line),
            Err(_) => Err(ParseError::InvalidUtf8),
        };

        match result {
            Ok(update) => parsed.updates.push(update),
            Err(error) => {
                let content = String::from_utf8_lossy(&buf).into_owned();
                warn!(line_number, line = %content, error = %error, "skipping malformed update line");
                parsed.skipped.push(SkippedLine {
                    line_number,
                    content,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(parsed)
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

fn check_commit_id<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ParseError> {
    if value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(value)
    } else {
        Err(ParseError::InvalidCommitId { field, value: value.to_string() })
    }
}
