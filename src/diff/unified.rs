//! Unified Diff Text Parsing
//!
//! Bitbucket Cloud returns raw unified diff text for commit and pull request
//! diffs. GitHub and GitLab embed per-file fragments of the same format
//! (hunk headers onward, no `diff --git` line) inside their JSON payloads;
//! their adapters reuse [`scan_fragment`] for line counting.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::scm::types::{FileChange, PullRequestStats};

/// Hunk header, capturing the new-side start line and optional span
static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").unwrap());

/// Line counts accumulated over one file's diff fragment
#[derive(Debug, Clone, Default)]
pub(crate) struct FragmentCounts {
    pub added: usize,
    pub removed: usize,
    /// New-side line numbers covered by the fragment's hunks
    pub changed_lines: BTreeSet<u32>,
}

/// Count added/removed lines and changed line numbers in one file fragment
///
/// The fragment is everything belonging to a single file: hunk headers and
/// content lines. `+++`/`---` file headers are tolerated and skipped. A
/// malformed hunk header contributes nothing to the changed-line set.
pub(crate) fn scan_fragment(fragment: &str) -> FragmentCounts {
    let mut counts = FragmentCounts::default();
    for line in fragment.lines() {
        if line.starts_with("@@") {
            match parse_hunk_header(line) {
                Some((start, span)) => {
                    for line_number in start..start.saturating_add(span) {
                        counts.changed_lines.insert(line_number);
                    }
                }
                None => log::debug!("Skipping malformed hunk header: {:?}", line),
            }
            continue;
        }
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            counts.added += 1;
        } else if line.starts_with('-') {
            counts.removed += 1;
        }
    }
    counts
}

/// New-side `(start, span)` from a hunk header; span defaults to 1
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let caps = HUNK_HEADER.captures(line)?;
    let start = caps[1].parse().ok()?;
    let span = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    Some((start, span))
}

/// Path from a `diff --git a/<old> b/<new>` header, `b/` prefix stripped
fn parse_git_header_path(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    let pos = rest.rfind(" b/")?;
    Some(rest[pos + 3..].trim().to_string())
}

/// Parse a full unified diff into per-file change records
///
/// Each `diff --git` header starts a new file block named by the b-side
/// path. Content before the first header is ignored.
pub fn parse_file_changes(diff_text: &str) -> Vec<FileChange> {
    let mut blocks: Vec<(String, String)> = Vec::new();
    for line in diff_text.lines() {
        if line.starts_with("diff --git ") {
            let path =
                parse_git_header_path(line).unwrap_or_else(|| "Unknown File".to_string());
            blocks.push((path, String::new()));
        } else if let Some((_, fragment)) = blocks.last_mut() {
            fragment.push_str(line);
            fragment.push('\n');
        }
    }

    blocks
        .into_iter()
        .map(|(path, fragment)| {
            let counts = scan_fragment(&fragment);
            let mut change = FileChange::new(path, counts.added, counts.removed);
            change.changed_line_numbers = counts.changed_lines;
            change
        })
        .collect()
}

/// Aggregate a full unified diff into pull request statistics
pub fn parse_pull_request_stats(diff_text: &str) -> PullRequestStats {
    let changes = parse_file_changes(diff_text);
    PullRequestStats {
        added_lines: changes.iter().map(|c| c.added_lines).sum(),
        removed_lines: changes.iter().map(|c| c.removed_lines).sum(),
        changed_files: changes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::types::ChangeType;

    #[test]
    fn test_single_file_with_mixed_changes() {
        let diff = "diff --git a/f.txt b/f.txt\n@@ -1,3 +1,4 @@\n+added\n-removed\n context\n";
        let changes = parse_file_changes(diff);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "f.txt");
        assert_eq!(changes[0].added_lines, 1);
        assert_eq!(changes[0].removed_lines, 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        let lines: Vec<u32> = changes[0].changed_line_numbers.iter().copied().collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_multiple_file_blocks() {
        let diff = concat!(
            "diff --git a/src/lib.rs b/src/lib.rs\n",
            "--- a/src/lib.rs\n",
            "+++ b/src/lib.rs\n",
            "@@ -10,2 +10,3 @@\n",
            "+fn added() {}\n",
            "+fn also_added() {}\n",
            "-fn gone() {}\n",
            "diff --git a/README.md b/README.md\n",
            "--- a/README.md\n",
            "+++ b/README.md\n",
            "@@ -1 +1 @@\n",
            "-old title\n",
            "+new title\n",
        );
        let changes = parse_file_changes(diff);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "src/lib.rs");
        assert_eq!(changes[0].added_lines, 2);
        assert_eq!(changes[0].removed_lines, 1);
        assert_eq!(changes[1].path, "README.md");
        assert_eq!(changes[1].added_lines, 1);
        assert_eq!(changes[1].removed_lines, 1);
    }

    #[test]
    fn test_file_header_lines_are_not_counted() {
        let diff = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n+x\n";
        let changes = parse_file_changes(diff);
        assert_eq!(changes[0].added_lines, 1);
        assert_eq!(changes[0].removed_lines, 0);
    }

    #[test]
    fn test_hunk_span_defaults_to_one() {
        let counts = scan_fragment("@@ -5 +7 @@\n+one\n");
        assert_eq!(counts.changed_lines.iter().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_malformed_hunk_header_contributes_nothing() {
        let counts = scan_fragment("@@ not a header @@\n+still counted\n");
        assert!(counts.changed_lines.is_empty());
        assert_eq!(counts.added, 1);
    }

    #[test]
    fn test_zero_span_hunk_has_no_changed_lines() {
        // Pure deletion: the new side covers no lines
        let counts = scan_fragment("@@ -3,2 +2,0 @@\n-gone\n-also gone\n");
        assert!(counts.changed_lines.is_empty());
        assert_eq!(counts.removed, 2);
    }

    #[test]
    fn test_changed_lines_deduplicate_across_hunks() {
        let counts = scan_fragment("@@ -1,2 +1,2 @@\n+a\n@@ -1,3 +2,2 @@\n+b\n");
        let lines: Vec<u32> = counts.changed_lines.iter().copied().collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_pull_request_stats_aggregate_all_files() {
        let diff = concat!(
            "diff --git a/a.rs b/a.rs\n@@ -1,2 +1,3 @@\n+x\n+y\n-z\n",
            "diff --git a/b.rs b/b.rs\n@@ -1 +1,2 @@\n+w\n",
        );
        let stats = parse_pull_request_stats(diff);
        assert_eq!(stats.added_lines, 3);
        assert_eq!(stats.removed_lines, 1);
        assert_eq!(stats.changed_files, 2);
    }

    #[test]
    fn test_empty_input_yields_no_changes() {
        assert!(parse_file_changes("").is_empty());
        assert_eq!(parse_pull_request_stats("").changed_files, 0);
    }

    #[test]
    fn test_path_with_directories() {
        let diff = "diff --git a/src/core/time.rs b/src/core/time.rs\n@@ -1 +1 @@\n+x\n";
        let changes = parse_file_changes(diff);
        assert_eq!(changes[0].path, "src/core/time.rs");
    }
}
