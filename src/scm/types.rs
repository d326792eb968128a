//! Normalised SCM Records
//!
//! Platform-neutral commit, merge request, and contributor records. Adapters
//! translate each platform's wire format into these before anything
//! downstream (user processing, reference resolution, persistence) runs, so
//! the rest of the pipeline never sees a platform payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Type of change a commit applied to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Deleted,
    Modified,
    Unchanged,
}

impl ChangeType {
    /// Derive the change kind from line counts when the platform does not
    /// report one explicitly
    pub fn from_counts(added: usize, removed: usize) -> Self {
        match (added > 0, removed > 0) {
            (true, false) => ChangeType::Added,
            (false, true) => ChangeType::Deleted,
            (true, true) => ChangeType::Modified,
            (false, false) => ChangeType::Unchanged,
        }
    }
}

/// Per-file change statistics within a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub change_type: ChangeType,
    /// New-side line numbers touched by the change, deduplicated and ordered
    pub changed_line_numbers: BTreeSet<u32>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, added_lines: usize, removed_lines: usize) -> Self {
        Self {
            path: path.into(),
            added_lines,
            removed_lines,
            change_type: ChangeType::from_counts(added_lines, removed_lines),
            changed_line_numbers: BTreeSet::new(),
        }
    }
}

/// Contributor identity attached to commits and merge requests
///
/// Identity for deduplication purposes is `(username, name, repository_name)`.
/// Email, the active flag, and the tool config id do not participate, so a
/// contributor whose email differs between platforms still deduplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Platform login. `None` means the platform could not attribute the
    /// record to an account; such users are counted but never persisted.
    pub username: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub repository_name: String,
    pub tool_config_id: String,
    pub active: bool,
}

impl User {
    pub fn new(username: Option<String>, name: impl Into<String>) -> Self {
        Self {
            username,
            name: name.into(),
            email: None,
            repository_name: String::new(),
            tool_config_id: String::new(),
            active: true,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.name == other.name
            && self.repository_name == other.repository_name
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
        self.name.hash(state);
        self.repository_name.hash(state);
    }
}

/// A normalised commit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    /// Candidate identity supplied by the platform at fetch time
    pub author: Option<User>,
    /// Resolved identity reference, populated before persistence
    pub author_ref: Option<User>,
    pub committer_ref: Option<User>,
    pub repository_name: String,
    pub tool_config_id: String,
    pub file_changes: Vec<FileChange>,
}

impl Commit {
    /// Minimal commit with empty identity fields; adapters fill in the rest
    pub fn new(
        hash: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            hash: hash.into(),
            message: message.into(),
            timestamp,
            author_name: String::new(),
            author_email: String::new(),
            committer_name: String::new(),
            committer_email: String::new(),
            author: None,
            author_ref: None,
            committer_ref: None,
            repository_name: String::new(),
            tool_config_id: String::new(),
            file_changes: Vec::new(),
        }
    }

    /// Sum of added lines across all file changes
    pub fn total_added_lines(&self) -> usize {
        self.file_changes.iter().map(|f| f.added_lines).sum()
    }

    /// Sum of removed lines across all file changes
    pub fn total_removed_lines(&self) -> usize {
        self.file_changes.iter().map(|f| f.removed_lines).sum()
    }
}

/// Lifecycle state of a merge request
///
/// Platform states collapse onto these three: anything still under review is
/// `Open`, anything merged (or completed) is `Merged`, and anything closed
/// without merging (declined, abandoned) is `Declined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeRequestState {
    Open,
    Merged,
    Declined,
}

/// Aggregate line statistics for a merge request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestStats {
    pub added_lines: usize,
    pub removed_lines: usize,
    pub changed_files: usize,
}

/// A normalised merge/pull request record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Platform-assigned PR/MR number
    pub id: u64,
    pub title: String,
    pub state: MergeRequestState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub source_branch: String,
    pub target_branch: String,
    /// Candidate author identity supplied by the platform
    pub author: Option<User>,
    /// Resolved author reference, populated before persistence
    pub author_ref: Option<User>,
    /// Raw reviewer usernames as reported by the platform
    pub reviewer_names: Vec<String>,
    /// Resolved reviewer references; unresolved names are omitted
    pub reviewer_refs: Vec<User>,
    pub stats: PullRequestStats,
    pub repository_name: String,
    pub tool_config_id: String,
}

impl MergeRequest {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        state: MergeRequestState,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            state,
            created_at,
            updated_at: None,
            merged_at: None,
            source_branch: String::new(),
            target_branch: String::new(),
            author: None,
            author_ref: None,
            reviewer_names: Vec::new(),
            reviewer_refs: Vec::new(),
            stats: PullRequestStats::default(),
            repository_name: String::new(),
            tool_config_id: String::new(),
        }
    }
}
