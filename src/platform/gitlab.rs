//! GitLab Adapter
//!
//! API v4 against `gitlab.com` or a self-managed instance. Projects are
//! addressed by their URL-encoded full path. Commit diffs arrive as
//! per-file unified fragments inside JSON, so counting goes through the
//! shared hunk scanner. Pagination comes from the `x-next-page` response
//! header. GitLab has no commit-level account login, so the candidate
//! identity falls back to the commit author name.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;

use super::client::{probe_error, ApiClient, Auth};
use super::traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};
use super::{invalid_url, require_base_url};
use crate::core::config::HttpConfig;
use crate::diff::unified;
use crate::ratelimit::monitor::RateLimitMonitor;
use crate::ratelimit::types::RateLimitStatus;
use crate::scan::request::ScanRequest;
use crate::scm::error::{PlatformApiError, ScmResult};
use crate::scm::tool::ScmTool;
use crate::scm::types::{
    ChangeType, Commit, FileChange, MergeRequest, MergeRequestState, PullRequestStats, User,
};

pub struct GitlabAdapter {
    client: ApiClient,
}

impl GitlabAdapter {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("gitlab", http.timeout_secs)?,
        })
    }

    fn auth(request: &ScanRequest) -> Auth {
        match request.token() {
            Some(token) if !token.trim().is_empty() => Auth::PrivateToken(token.to_string()),
            _ => Auth::None,
        }
    }
}

/// API root for an instance base URL, appending `/api/v4` when absent
pub fn api_root(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/api/v4") {
        trimmed.to_string()
    } else {
        format!("{}/api/v4", trimmed)
    }
}

/// Full project path from a repository URL, ready for URL encoding
///
/// GitLab projects may be nested under groups, so every path segment
/// belongs to the project identifier.
pub fn parse_project_path(url: &str) -> ScmResult<String> {
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid_url(url))?;
    let path = parsed
        .path()
        .trim_matches('/')
        .trim_end_matches(".git")
        .to_string();
    if path.is_empty() {
        return Err(invalid_url(url));
    }
    Ok(path)
}

fn next_page_from_headers(headers: &HeaderMap) -> Option<u32> {
    headers.get("x-next-page")?.to_str().ok()?.trim().parse().ok()
}

#[derive(Debug, Deserialize)]
struct ProjectWire {
    id: u64,
    name: String,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitWire {
    pub id: String,
    #[serde(default)]
    pub message: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DiffWire {
    pub new_path: String,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccountWire {
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequestWire {
    pub iid: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    pub author: Option<AccountWire>,
    #[serde(default)]
    pub reviewers: Vec<AccountWire>,
}

#[derive(Debug, Deserialize)]
struct ChangesWire {
    #[serde(default)]
    changes: Vec<DiffWire>,
}

pub fn convert_diff_file(wire: DiffWire) -> FileChange {
    let counts = unified::scan_fragment(&wire.diff);
    let mut change = FileChange::new(wire.new_path, counts.added, counts.removed);
    change.changed_line_numbers = counts.changed_lines;
    if wire.new_file {
        change.change_type = ChangeType::Added;
    } else if wire.deleted_file {
        change.change_type = ChangeType::Deleted;
    } else if wire.renamed_file {
        change.change_type = ChangeType::Modified;
    }
    change
}

pub fn convert_commit(wire: CommitWire, files: Vec<DiffWire>) -> Commit {
    let mut commit = Commit::new(wire.id, wire.message, wire.created_at);
    commit.author_name = wire.author_name.clone().unwrap_or_default();
    commit.author_email = wire.author_email.clone().unwrap_or_default();
    commit.committer_name = wire.committer_name.unwrap_or_default();
    commit.committer_email = wire.committer_email.unwrap_or_default();

    // No commit-level login on GitLab; the author name doubles as the
    // candidate username
    if let Some(name) = wire.author_name.filter(|n| !n.trim().is_empty()) {
        commit.author = Some(User::new(Some(name.clone()), name).with_email(wire.author_email));
    }

    commit.file_changes = files.into_iter().map(convert_diff_file).collect();
    commit
}

pub fn stats_from_changes(changes: &[DiffWire]) -> PullRequestStats {
    let mut stats = PullRequestStats {
        changed_files: changes.len(),
        ..Default::default()
    };
    for change in changes {
        let counts = unified::scan_fragment(&change.diff);
        stats.added_lines += counts.added;
        stats.removed_lines += counts.removed;
    }
    stats
}

pub fn convert_merge_request(wire: MergeRequestWire, changes: &[DiffWire]) -> MergeRequest {
    let state = match wire.state.as_str() {
        "merged" => MergeRequestState::Merged,
        "opened" | "locked" => MergeRequestState::Open,
        _ => MergeRequestState::Declined,
    };

    let mut mr = MergeRequest::new(wire.iid, wire.title, state, wire.created_at);
    mr.updated_at = wire.updated_at;
    mr.merged_at = wire.merged_at;
    mr.source_branch = wire.source_branch;
    mr.target_branch = wire.target_branch;
    if let Some(account) = wire.author {
        let display = account.name.unwrap_or_else(|| account.username.clone());
        mr.author = Some(User::new(Some(account.username), display));
    }
    mr.reviewer_names = wire.reviewers.into_iter().map(|r| r.username).collect();
    mr.stats = stats_from_changes(changes);
    mr
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl PlatformAdapter for GitlabAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::GitLab
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        let root = api_root(&require_base_url(request)?);
        let project =
            urlencoding::encode(&parse_project_path(request.repository_url())?).into_owned();
        let url = format!("{}/projects/{}", root, project);
        let wire: ProjectWire = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;
        Ok(RepositoryInfo {
            id: wire.id.to_string(),
            name: wire.name,
            default_branch: wire.default_branch,
        })
    }

    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<Commit>> {
        let root = api_root(&require_base_url(request)?);
        let project =
            urlencoding::encode(&parse_project_path(request.repository_url())?).into_owned();
        let auth = Self::auth(request);
        let page_number = page.cursor_number(1);

        let mut url = format!(
            "{}/projects/{}/repository/commits?per_page={}&page={}",
            root, project, page.per_page, page_number
        );
        if let Some(branch) = request.branch() {
            url.push_str(&format!("&ref_name={}", urlencoding::encode(branch)));
        }
        if let Some(since) = page.since {
            url.push_str(&format!("&since={}", urlencoding::encode(&format_date(since))));
        }
        if let Some(until) = page.until {
            url.push_str(&format!("&until={}", urlencoding::encode(&format_date(until))));
        }

        let (summaries, headers): (Vec<CommitWire>, HeaderMap) = self
            .client
            .get_json_with_headers(&url, &auth, request.repository_name())
            .await?;

        let mut commits = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let diff_url = format!(
                "{}/projects/{}/repository/commits/{}/diff",
                root, project, summary.id
            );
            let files: Vec<DiffWire> = self
                .client
                .get_json(&diff_url, &auth, request.repository_name())
                .await?;
            let mut commit = convert_commit(summary, files);
            commit.tool_config_id = request.tool_config_id().to_string();
            commits.push(commit);
        }

        let next = next_page_from_headers(&headers).map(PageCursor::Number);
        Ok(Page::with_next(commits, next))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        let root = api_root(&require_base_url(request)?);
        let project =
            urlencoding::encode(&parse_project_path(request.repository_url())?).into_owned();
        let auth = Self::auth(request);
        let page_number = page.cursor_number(1);

        let url = format!(
            "{}/projects/{}/merge_requests?state=all&per_page={}&page={}",
            root, project, page.per_page, page_number
        );
        let (summaries, headers): (Vec<MergeRequestWire>, HeaderMap) = self
            .client
            .get_json_with_headers(&url, &auth, request.repository_name())
            .await?;

        let mut merge_requests = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let changes_url = format!(
                "{}/projects/{}/merge_requests/{}/changes",
                root, project, summary.iid
            );
            let changes: ChangesWire = self
                .client
                .get_json(&changes_url, &auth, request.repository_name())
                .await?;
            let mut mr = convert_merge_request(summary, &changes.changes);
            mr.tool_config_id = request.tool_config_id().to_string();
            merge_requests.push(mr);
        }

        let next = next_page_from_headers(&headers).map(PageCursor::Number);
        Ok(Page::with_next(merge_requests, next))
    }
}

/// GitLab's quota surface: `RateLimit-*` headers on a cheap authenticated
/// probe of `/user`
pub struct GitlabRateLimitMonitor {
    client: ApiClient,
}

impl GitlabRateLimitMonitor {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("gitlab", http.timeout_secs)?,
        })
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl RateLimitMonitor for GitlabRateLimitMonitor {
    fn platform(&self) -> &'static str {
        "gitlab"
    }

    async fn check(
        &self,
        token: &str,
        base_url: &str,
    ) -> Result<RateLimitStatus, PlatformApiError> {
        let url = format!("{}/user", api_root(base_url));
        let auth = Auth::PrivateToken(token.to_string());
        let (_, headers): (serde_json::Value, HeaderMap) = self
            .client
            .get_json_with_headers(&url, &auth, "rate_limit")
            .await
            .map_err(|e| probe_error("gitlab", e))?;

        // Instances without rate limiting send no headers; limit 0 reads as
        // unconstrained downstream
        let limit = header_u64(&headers, "ratelimit-limit").unwrap_or(0);
        let used = header_u64(&headers, "ratelimit-observed").unwrap_or(0);
        let remaining = header_u64(&headers, "ratelimit-remaining").unwrap_or(0);
        let reset_at = header_u64(&headers, "ratelimit-reset")
            .and_then(|s| DateTime::from_timestamp(s as i64, 0))
            .unwrap_or(DateTime::UNIX_EPOCH);

        Ok(RateLimitStatus {
            platform: "gitlab".to_string(),
            limit,
            used,
            remaining,
            reset_at,
        })
    }
}
