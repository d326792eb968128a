//! Diff Parsing
//!
//! Two diff formats arrive from the platforms: raw unified text (Bitbucket
//! Cloud, plus the per-file fragments GitHub and GitLab embed in JSON) and
//! Bitbucket Server's structured JSON document. Both parse into the same
//! normalised shapes: `Vec<FileChange>` per commit and `PullRequestStats`
//! per merge request.

pub mod error;
pub mod structured;
pub mod unified;

pub use error::{DiffEntryError, DiffError};
pub use structured::DiffOutcome;
