//! Platform adapter trait and pagination types

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::tool::ScmTool;
use crate::scm::types::{Commit, MergeRequest};

/// Repository metadata resolved by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Platform-assigned identifier, numeric or opaque
    pub id: String,
    pub name: String,
    pub default_branch: Option<String>,
}

/// Platform-native position of the next page
///
/// Page-number and offset platforms use `Number`; Bitbucket Cloud hands
/// back a full continuation URL, carried as `Token`. Each adapter owns the
/// interpretation of its own cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    Number(u32),
    Token(String),
}

/// Parameters for one paginated fetch round
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// `None` requests the first page
    pub cursor: Option<PageCursor>,
    pub per_page: usize,
    /// Effective lower date bound, already resolved by the fetcher
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PageRequest {
    pub fn first(per_page: usize) -> Self {
        Self {
            cursor: None,
            per_page,
            since: None,
            until: None,
        }
    }

    pub fn with_dates(
        mut self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Move this request to the given cursor
    pub fn advance(&mut self, cursor: PageCursor) {
        self.cursor = Some(cursor);
    }

    /// Numeric cursor value, for adapters that paginate by page or offset
    pub fn cursor_number(&self, default: u32) -> u32 {
        match &self.cursor {
            Some(PageCursor::Number(n)) => *n,
            _ => default,
        }
    }
}

/// One fetched page of items
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when this was the last page
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn with_next(items: Vec<T>, next: Option<PageCursor>) -> Self {
        Self { items, next }
    }
}

/// A platform-specific fetch implementation
///
/// Adapters translate one platform's REST surface into the normalised
/// records; everything downstream of them is platform-neutral. Commits are
/// returned newest first, matching every supported platform's default
/// ordering, which the fetchers rely on for early termination at the date
/// bound.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The tool this adapter serves
    fn tool(&self) -> ScmTool;

    /// Resolve repository metadata ahead of a scan
    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo>;

    /// Fetch one page of commits
    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<Commit>>;

    /// Fetch one page of merge requests
    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>>;
}
