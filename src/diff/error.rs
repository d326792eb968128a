//! Diff parsing error types

/// Document-level diff parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// The response body was not parseable JSON
    #[error("Diff response is not valid JSON: {message}")]
    InvalidDocument { message: String },

    /// Valid JSON but the expected `diffs` array is absent
    #[error("Diff response has no 'diffs' array")]
    MissingDiffs,
}

/// A single structured diff entry that failed to parse
///
/// Collected in [`DiffOutcome::skipped`](super::structured::DiffOutcome);
/// one bad entry never aborts its siblings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Diff entry {index} could not be parsed: {message}")]
pub struct DiffEntryError {
    pub index: usize,
    pub message: String,
}
