//! Structured JSON Diff Parsing
//!
//! Bitbucket Server describes diffs as a JSON document rather than unified
//! text: `diffs[].hunks[].segments[].lines[]`, where each segment is typed
//! ADDED, REMOVED, or CONTEXT. Entries are parsed independently so one
//! malformed entry skips only itself; the skip is reported as a typed
//! [`DiffEntryError`] instead of being silently discarded.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use super::error::{DiffEntryError, DiffError};
use crate::scm::types::{FileChange, PullRequestStats};

/// Sentinel path for entries that carry no source path
pub const UNKNOWN_FILE: &str = "Unknown File";

/// Result of parsing one structured diff document
#[derive(Debug, Default)]
pub struct DiffOutcome {
    /// Successfully parsed per-file changes
    pub changes: Vec<FileChange>,
    /// Entries that failed to parse, with their index and cause
    pub skipped: Vec<DiffEntryError>,
}

impl DiffOutcome {
    /// Total number of top-level diff entries in the document
    pub fn total_entries(&self) -> usize {
        self.changes.len() + self.skipped.len()
    }
}

#[derive(Debug, Deserialize)]
struct DiffEntry {
    #[serde(default)]
    source: Option<DiffPath>,
    #[serde(default)]
    hunks: Vec<DiffHunk>,
}

#[derive(Debug, Deserialize)]
struct DiffPath {
    #[serde(rename = "toString")]
    to_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiffHunk {
    #[serde(default)]
    segments: Vec<DiffSegment>,
}

#[derive(Debug, Deserialize)]
struct DiffSegment {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    lines: Vec<DiffLine>,
}

#[derive(Debug, Deserialize)]
struct DiffLine {
    #[serde(default)]
    source: Option<u32>,
    #[serde(default)]
    destination: Option<u32>,
}

/// Parse a structured diff document into per-file change records
///
/// The document must be JSON with a top-level `diffs` array; anything else
/// is a document-level error. Within the array each entry parses
/// independently and failures land in [`DiffOutcome::skipped`].
pub fn parse_file_changes(raw: &str) -> Result<DiffOutcome, DiffError> {
    let document: Value =
        serde_json::from_str(raw).map_err(|e| DiffError::InvalidDocument {
            message: e.to_string(),
        })?;
    let entries = document
        .get("diffs")
        .and_then(Value::as_array)
        .ok_or(DiffError::MissingDiffs)?;

    let mut outcome = DiffOutcome::default();
    for (index, raw_entry) in entries.iter().enumerate() {
        match serde_json::from_value::<DiffEntry>(raw_entry.clone()) {
            Ok(entry) => outcome.changes.push(convert_entry(entry)),
            Err(e) => outcome.skipped.push(DiffEntryError {
                index,
                message: e.to_string(),
            }),
        }
    }
    Ok(outcome)
}

/// Aggregate a structured diff document into pull request statistics
///
/// `changed_files` counts every top-level entry, including ones whose hunks
/// failed to parse; line counts accumulate from parseable entries only.
pub fn parse_pull_request_stats(raw: &str) -> Result<PullRequestStats, DiffError> {
    let outcome = parse_file_changes(raw)?;
    Ok(PullRequestStats {
        added_lines: outcome.changes.iter().map(|c| c.added_lines).sum(),
        removed_lines: outcome.changes.iter().map(|c| c.removed_lines).sum(),
        changed_files: outcome.total_entries(),
    })
}

fn convert_entry(entry: DiffEntry) -> FileChange {
    let path = entry
        .source
        .and_then(|p| p.to_string)
        .unwrap_or_else(|| UNKNOWN_FILE.to_string());

    let mut added = 0usize;
    let mut removed = 0usize;
    let mut changed_lines = BTreeSet::new();

    for hunk in &entry.hunks {
        for segment in &hunk.segments {
            if segment.kind.eq_ignore_ascii_case("context") {
                continue;
            }
            let is_added = segment.kind.eq_ignore_ascii_case("added");
            let is_removed = segment.kind.eq_ignore_ascii_case("removed");
            for line in &segment.lines {
                if is_added {
                    added += 1;
                    // Added lines live on the destination side
                    if let Some(n) = line.destination.or(line.source) {
                        changed_lines.insert(n);
                    }
                } else if is_removed {
                    removed += 1;
                    if let Some(n) = line.source.or(line.destination) {
                        changed_lines.insert(n);
                    }
                }
            }
        }
    }

    let mut change = FileChange::new(path, added, removed);
    change.changed_line_numbers = changed_lines;
    change
}
