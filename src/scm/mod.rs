//! SCM Domain Model
//!
//! The platform-neutral core of the scan pipeline: normalised records
//! (commits, merge requests, contributors), the platform enum used as the key
//! for all per-platform dispatch, and the error taxonomy every fallible
//! operation returns.

pub mod error;
pub mod tool;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{
    DataProcessingError, PlatformApiError, RateLimitError, RepositoryError, ScmError, ScmResult,
};
pub use tool::{parse_tool, ScmTool};
pub use types::{
    ChangeType, Commit, FileChange, MergeRequest, MergeRequestState, PullRequestStats, User,
};
