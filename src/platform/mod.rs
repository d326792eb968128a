//! Platform Adapters
//!
//! One adapter per hosting platform, all behind the [`PlatformAdapter`]
//! trait. Each adapter derives its API coordinates from the repository
//! URL, converts the platform's wire payloads into the shared commit and
//! merge request types, and reports pagination through an opaque cursor.
//! The [`AdapterRegistry`] hands out adapters by tool.

pub mod client;
pub mod registry;
pub mod traits;

pub(crate) mod azure;
pub(crate) mod bitbucket_cloud;
pub(crate) mod bitbucket_server;
pub(crate) mod github;
pub(crate) mod gitlab;

#[cfg(test)]
mod tests;

pub use registry::{default_monitors, AdapterRegistry};
pub use traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};

use crate::scan::request::ScanRequest;
use crate::scm::error::{RepositoryError, ScmError, ScmResult};

pub(crate) fn invalid_url(url: &str) -> ScmError {
    ScmError::Repository(RepositoryError::InvalidUrl {
        url: url.to_string(),
    })
}

/// Base URL for API calls, trailing slash trimmed
///
/// Falls back to the tool's hosted endpoint; platforms without one
/// (Bitbucket Server) reject the scan until `--base-url` is given.
pub(crate) fn require_base_url(request: &ScanRequest) -> ScmResult<String> {
    request
        .effective_base_url()
        .map(|base| base.trim_end_matches('/').to_string())
        .ok_or_else(|| ScmError::Configuration {
            message: format!(
                "{} requires an explicit base URL (--base-url)",
                request.tool().label()
            ),
        })
}

/// Non-empty path segments of a repository URL, requiring at least `min`
pub(crate) fn url_path_segments(url: &str, min: usize) -> ScmResult<Vec<String>> {
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid_url(url))?;
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|parts| {
            parts
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if segments.len() < min {
        return Err(invalid_url(url));
    }
    Ok(segments)
}
