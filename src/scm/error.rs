//! SCM Error Taxonomy
//!
//! Every fallible operation in the scan pipeline returns [`ScmResult`]. The
//! top-level [`ScmError`] wraps category-specific errors transparently so
//! callers can match on the category without losing the platform detail.

use chrono::{DateTime, Utc};

use crate::core::error_handling::ContextualError;
use crate::core::validation::ValidationError;
use crate::diff::error::DiffError;

/// Result alias used throughout the scan pipeline
pub type ScmResult<T> = Result<T, ScmError>;

/// Top-level error for SCM operations
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error(transparent)]
    PlatformApi(#[from] PlatformApiError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    DataProcessing(#[from] DataProcessingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Invalid tool name, missing base URL, malformed settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Cooperative cancellation observed at a page boundary
    #[error("Scan cancelled for repository '{repository}'")]
    Cancelled { repository: String },
}

/// A platform REST call failed with a non-success status or transport error
///
/// Transport-level failures (connection refused, timeout) use status 0.
#[derive(Debug, thiserror::Error)]
#[error("{platform} API request failed (HTTP {status}): {message}")]
pub struct PlatformApiError {
    pub platform: String,
    pub status: u16,
    pub message: String,
}

/// Rate limit usage crossed the configured threshold and the cooldown was
/// too long to wait out
#[derive(Debug, thiserror::Error)]
#[error(
    "{platform} rate limit usage {used}/{limit} exceeds threshold {threshold}; resets at {reset_at}"
)]
pub struct RateLimitError {
    pub platform: String,
    pub used: u64,
    pub limit: u64,
    pub threshold: f64,
    pub reset_at: DateTime<Utc>,
}

/// Failures while normalising, deduplicating, or persisting fetched records
#[derive(Debug, thiserror::Error)]
pub enum DataProcessingError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Transformation failed: {message}")]
    Transformation { message: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Duplicate record: {message}")]
    Duplicate { message: String },

    #[error("Record not found: {message}")]
    NotFound { message: String },

    /// Wrapper applied by the scan executor so that every failure carries
    /// the repository name and URL it belongs to
    #[error("Scan failed for repository '{repository}' ({url}): {source}")]
    Scan {
        repository: String,
        url: String,
        #[source]
        source: Box<ScmError>,
    },
}

/// Repository-level access failures mapped from HTTP statuses
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Repository not found: {repository}")]
    NotFound { repository: String },

    #[error("Access denied to repository '{repository}'")]
    AccessDenied { repository: String },

    #[error("Authentication failed for repository '{repository}'")]
    AuthenticationFailed { repository: String },

    #[error("Invalid repository URL: {url}")]
    InvalidUrl { url: String },

    #[error("Failed to clone repository '{repository}': {message}")]
    CloneFailed { repository: String, message: String },
}

impl ScmError {
    /// Wrap an error in the executor's per-repository scan context
    pub fn into_scan_context(self, repository: &str, url: &str) -> ScmError {
        ScmError::DataProcessing(DataProcessingError::Scan {
            repository: repository.to_string(),
            url: url.to_string(),
            source: Box::new(self),
        })
    }
}

impl From<ValidationError> for ScmError {
    fn from(err: ValidationError) -> Self {
        ScmError::DataProcessing(DataProcessingError::Validation {
            message: err.message,
        })
    }
}

impl ContextualError for ScmError {
    fn is_user_actionable(&self) -> bool {
        match self {
            // User can fix the tool name, URL, or date bounds
            ScmError::Configuration { .. } => true,
            ScmError::DataProcessing(DataProcessingError::Validation { .. }) => true,
            // The scan wrapper keeps the underlying cause's actionability
            ScmError::DataProcessing(DataProcessingError::Scan { source, .. }) => {
                source.is_user_actionable()
            }
            // API failures, rate limits, and cancellations are operational
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScmError::Configuration { message } => Some(message),
            ScmError::DataProcessing(DataProcessingError::Validation { message }) => Some(message),
            ScmError::DataProcessing(DataProcessingError::Scan { source, .. }) => {
                source.user_message()
            }
            _ => None,
        }
    }
}
