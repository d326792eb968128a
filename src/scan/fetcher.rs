//! Paginated fetch façades
//!
//! Wrap the adapter page loop with the concerns every scan shares:
//! cancellation at page boundaries, a rate limit check before each round,
//! date-bound filtering, and the result-size limit. Errors propagate
//! unchanged; the executor wraps them with scan context.

use std::sync::Arc;

use crate::core::shutdown::CancelFlag;
use crate::platform::traits::{PageRequest, PlatformAdapter};
use crate::ratelimit::service::RateLimitService;
use crate::scan::request::ScanRequest;
use crate::scm::error::{ScmError, ScmResult};
use crate::scm::types::{Commit, MergeRequest};

/// Page-loop statistics for logging
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStats {
    pub pages: usize,
    pub fetched: usize,
    pub kept: usize,
}

fn cancelled(request: &ScanRequest) -> ScmError {
    ScmError::Cancelled {
        repository: request.repository_name().to_string(),
    }
}

pub struct CommitFetcher {
    rate_limits: Arc<RateLimitService>,
}

impl CommitFetcher {
    pub fn new(rate_limits: Arc<RateLimitService>) -> Self {
        Self { rate_limits }
    }

    /// Fetch commits page by page until the adapter, the date bound, or
    /// the result limit stops the loop
    pub async fn fetch_all(
        &self,
        adapter: &dyn PlatformAdapter,
        request: &ScanRequest,
        cancel: &CancelFlag,
    ) -> ScmResult<(Vec<Commit>, FetchStats)> {
        let platform = request.tool().to_string();
        let base_url = request.effective_base_url().unwrap_or_default();
        let since = request.effective_since();
        let until = request.until();
        let limit = request.limit();

        let mut page = PageRequest::first(request.per_page()).with_dates(since, until);
        let mut commits = Vec::new();
        let mut stats = FetchStats::default();

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(request));
            }
            self.rate_limits
                .check_rate_limit(&platform, request.token(), request.repository_name(), &base_url)
                .await?;

            let fetched = adapter.fetch_commits(request, &page).await?;
            stats.pages += 1;
            stats.fetched += fetched.items.len();

            // Commits arrive newest first, so the first one older than the
            // lower bound ends the scan
            let mut reached_lower_bound = false;
            for commit in fetched.items {
                if let Some(until) = until {
                    if commit.timestamp > until {
                        continue;
                    }
                }
                if let Some(since) = since {
                    if commit.timestamp < since {
                        reached_lower_bound = true;
                        break;
                    }
                }
                commits.push(commit);
                if limit > 0 && commits.len() >= limit {
                    break;
                }
            }

            if limit > 0 && commits.len() >= limit {
                commits.truncate(limit);
                break;
            }
            if reached_lower_bound {
                break;
            }
            match fetched.next {
                Some(cursor) => page.advance(cursor),
                None => break,
            }
        }

        stats.kept = commits.len();
        log::debug!(
            "Fetched {} commits for '{}' over {} pages ({} kept)",
            stats.fetched,
            request.repository_name(),
            stats.pages,
            stats.kept
        );
        Ok((commits, stats))
    }
}

pub struct MergeRequestFetcher {
    rate_limits: Arc<RateLimitService>,
}

impl MergeRequestFetcher {
    pub fn new(rate_limits: Arc<RateLimitService>) -> Self {
        Self { rate_limits }
    }

    pub async fn fetch_all(
        &self,
        adapter: &dyn PlatformAdapter,
        request: &ScanRequest,
        cancel: &CancelFlag,
    ) -> ScmResult<(Vec<MergeRequest>, FetchStats)> {
        let platform = request.tool().to_string();
        let base_url = request.effective_base_url().unwrap_or_default();
        let limit = request.limit();

        let mut page = PageRequest::first(request.per_page());
        let mut merge_requests = Vec::new();
        let mut stats = FetchStats::default();

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(request));
            }
            self.rate_limits
                .check_rate_limit(&platform, request.token(), request.repository_name(), &base_url)
                .await?;

            let fetched = adapter.fetch_merge_requests(request, &page).await?;
            stats.pages += 1;
            stats.fetched += fetched.items.len();
            merge_requests.extend(fetched.items);

            if limit > 0 && merge_requests.len() >= limit {
                merge_requests.truncate(limit);
                break;
            }
            match fetched.next {
                Some(cursor) => page.advance(cursor),
                None => break,
            }
        }

        stats.kept = merge_requests.len();
        log::debug!(
            "Fetched {} merge requests for '{}' over {} pages ({} kept)",
            stats.fetched,
            request.repository_name(),
            stats.pages,
            stats.kept
        );
        Ok((merge_requests, stats))
    }
}
