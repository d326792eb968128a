//! Shared fixtures for the integration tests
//!
//! A scripted platform adapter stands in for the real REST adapters so the
//! scan pipeline can run end to end through the public API without any
//! network access.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use scmscan::core::time::SystemClock;
use scmscan::platform::{AdapterRegistry, Page, PageRequest, PlatformAdapter, RepositoryInfo};
use scmscan::ratelimit::{RateLimitConfig, RateLimitService};
use scmscan::scan::{MemoryPersistence, PersistenceService, ScanCommandExecutor, ScanRequest};
use scmscan::scm::{
    Commit, MergeRequest, MergeRequestState, PlatformApiError, ScmResult, ScmTool, User,
};

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
}

pub fn commit_authored(hash: &str, d: u32, username: &str) -> Commit {
    let mut commit = Commit::new(hash, format!("commit {}", hash), day(d));
    commit.author_name = username.to_string();
    commit.author = Some(User::new(Some(username.to_string()), username));
    commit
}

pub fn open_mr(id: u64, username: &str) -> MergeRequest {
    let mut mr = MergeRequest::new(id, format!("mr {}", id), MergeRequestState::Open, day(1));
    mr.author = Some(User::new(Some(username.to_string()), username));
    mr
}

/// Single-page adapter with per-URL failure injection
///
/// `fail_url_containing` makes fetches fail for matching repository URLs
/// only, so one scan in a batch can fail while the rest proceed.
pub struct ScriptedAdapter {
    pub commits: Vec<Commit>,
    pub merge_requests: Vec<MergeRequest>,
    pub fail_url_containing: Option<String>,
}

impl ScriptedAdapter {
    pub fn new(commits: Vec<Commit>, merge_requests: Vec<MergeRequest>) -> Self {
        Self {
            commits,
            merge_requests,
            fail_url_containing: None,
        }
    }

    pub fn failing_for(mut self, fragment: &str) -> Self {
        self.fail_url_containing = Some(fragment.to_string());
        self
    }

    fn check(&self, request: &ScanRequest) -> ScmResult<()> {
        if let Some(fragment) = &self.fail_url_containing {
            if request.repository_url().contains(fragment.as_str()) {
                return Err(PlatformApiError {
                    platform: "github".to_string(),
                    status: 502,
                    message: "upstream unavailable".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::GitHub
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        self.check(request)?;
        Ok(RepositoryInfo {
            id: "1".to_string(),
            name: request.repository_name().to_string(),
            default_branch: Some("main".to_string()),
        })
    }

    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        _page: &PageRequest,
    ) -> ScmResult<Page<Commit>> {
        self.check(request)?;
        Ok(Page::last(self.commits.clone()))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        _page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        self.check(request)?;
        Ok(Page::last(self.merge_requests.clone()))
    }
}

pub fn github_request(url: &str) -> ScanRequest {
    ScanRequest::builder(url, ScmTool::GitHub).build()
}

/// Executor over the scripted adapter with the given persistence backend
pub fn executor_with(
    adapter: ScriptedAdapter,
    persistence: Arc<dyn PersistenceService>,
) -> ScanCommandExecutor {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(adapter));
    let rate_limits = Arc::new(RateLimitService::new(
        RateLimitConfig::default(),
        Vec::new(),
        Arc::new(SystemClock),
    ));
    ScanCommandExecutor::new(
        Arc::new(registry),
        rate_limits,
        persistence,
        Arc::new(SystemClock),
    )
}

/// Convenience wrapper pairing the executor with in-memory persistence
pub fn memory_executor(adapter: ScriptedAdapter) -> (ScanCommandExecutor, Arc<MemoryPersistence>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let executor = executor_with(adapter, persistence.clone());
    (executor, persistence)
}
