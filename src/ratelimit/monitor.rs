//! Rate limit monitor trait

use async_trait::async_trait;

use super::types::RateLimitStatus;
use crate::scm::error::PlatformApiError;

/// Live quota probe for a single platform
///
/// Monitors exist only for platforms that expose a queryable quota surface
/// (GitHub's `/rate_limit` endpoint, GitLab's `RateLimit-*` headers).
/// Platforms without one register no monitor, and the service treats their
/// checks as no-ops.
#[async_trait]
pub trait RateLimitMonitor: Send + Sync {
    /// Platform name this monitor serves, matched case-insensitively
    fn platform(&self) -> &'static str;

    /// Usage threshold applied when the config does not set one
    fn default_threshold(&self) -> f64 {
        0.8
    }

    /// Probe the platform's current quota
    async fn check(&self, token: &str, base_url: &str)
        -> Result<RateLimitStatus, PlatformApiError>;
}
