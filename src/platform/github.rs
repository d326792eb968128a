//! GitHub Adapter
//!
//! REST v3 over `api.github.com` (or a GitHub Enterprise base URL). Commit
//! listing is two-phase: the list endpoint yields hashes, a per-commit
//! detail call yields file stats including the `patch` fragment that the
//! unified hunk scanner turns into changed line numbers. Pull requests
//! likewise need a per-PR detail call for addition/deletion/file counts.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

use super::client::{probe_error, ApiClient, Auth};
use super::traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};
use super::{require_base_url, url_path_segments};
use crate::core::config::HttpConfig;
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::diff::unified;
use crate::ratelimit::monitor::RateLimitMonitor;
use crate::ratelimit::types::RateLimitStatus;
use crate::scan::request::ScanRequest;
use crate::scm::error::{PlatformApiError, ScmError, ScmResult};
use crate::scm::tool::ScmTool;
use crate::scm::types::{
    ChangeType, Commit, FileChange, MergeRequest, MergeRequestState, PullRequestStats, User,
};

pub struct GithubAdapter {
    client: ApiClient,
    /// owner/repo → numeric repository id, filled on first resolution
    repo_ids: RwLock<HashMap<String, u64>>,
}

impl GithubAdapter {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("github", http.timeout_secs)?,
            repo_ids: RwLock::new(HashMap::new()),
        })
    }

    fn auth(request: &ScanRequest) -> Auth {
        match request.token() {
            Some(token) if !token.trim().is_empty() => Auth::Bearer(token.to_string()),
            _ => Auth::None,
        }
    }
}

fn lock_error(message: String) -> ScmError {
    ScmError::Configuration { message }
}

/// `owner` and `repo` from a GitHub repository URL
pub fn parse_owner_repo(url: &str) -> ScmResult<(String, String)> {
    let segments = url_path_segments(url, 2)?;
    let owner = segments[0].clone();
    let repo = segments[1].trim_end_matches(".git").to_string();
    Ok((owner, repo))
}

#[derive(Debug, Deserialize)]
struct RepositoryWire {
    id: u64,
    name: String,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitSummaryWire {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetailWire {
    pub sha: String,
    pub commit: GitCommitWire,
    pub author: Option<AccountWire>,
    #[serde(default)]
    pub files: Vec<FileWire>,
}

#[derive(Debug, Deserialize)]
pub struct GitCommitWire {
    pub message: String,
    pub author: Option<IdentityWire>,
    pub committer: Option<IdentityWire>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentityWire {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AccountWire {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct FileWire {
    pub filename: String,
    #[serde(default)]
    pub additions: usize,
    #[serde(default)]
    pub deletions: usize,
    pub status: Option<String>,
    pub patch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullSummaryWire {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub head: BranchWire,
    pub base: BranchWire,
    pub user: Option<AccountWire>,
    #[serde(default)]
    pub requested_reviewers: Vec<AccountWire>,
}

#[derive(Debug, Deserialize)]
pub struct BranchWire {
    #[serde(rename = "ref")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PullDetailWire {
    #[serde(default)]
    pub additions: usize,
    #[serde(default)]
    pub deletions: usize,
    #[serde(default)]
    pub changed_files: usize,
}

pub fn convert_commit(detail: CommitDetailWire) -> Commit {
    let author_identity = detail.commit.author.unwrap_or_default();
    let committer_identity = detail.commit.committer.unwrap_or_default();
    let timestamp = author_identity
        .date
        .or(committer_identity.date)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let mut commit = Commit::new(detail.sha, detail.commit.message, timestamp);
    commit.author_name = author_identity.name.clone().unwrap_or_default();
    commit.author_email = author_identity.email.clone().unwrap_or_default();
    commit.committer_name = committer_identity.name.unwrap_or_default();
    commit.committer_email = committer_identity.email.unwrap_or_default();

    if let Some(account) = detail.author {
        let display = if commit.author_name.is_empty() {
            account.login.clone()
        } else {
            commit.author_name.clone()
        };
        commit.author =
            Some(User::new(Some(account.login), display).with_email(author_identity.email));
    }

    commit.file_changes = detail.files.into_iter().map(convert_file).collect();
    commit
}

pub fn convert_file(file: FileWire) -> FileChange {
    let mut change = FileChange::new(file.filename, file.additions, file.deletions);
    if let Some(status) = file.status.as_deref() {
        change.change_type = map_file_status(status, file.additions, file.deletions);
    }
    if let Some(patch) = &file.patch {
        change.changed_line_numbers = unified::scan_fragment(patch).changed_lines;
    }
    change
}

pub fn map_file_status(status: &str, added: usize, removed: usize) -> ChangeType {
    match status {
        "added" => ChangeType::Added,
        "removed" => ChangeType::Deleted,
        "unchanged" => ChangeType::Unchanged,
        "modified" | "changed" | "renamed" | "copied" => ChangeType::Modified,
        _ => ChangeType::from_counts(added, removed),
    }
}

pub fn convert_pull_request(summary: PullSummaryWire, detail: PullDetailWire) -> MergeRequest {
    let state = if summary.merged_at.is_some() {
        MergeRequestState::Merged
    } else if summary.state.eq_ignore_ascii_case("open") {
        MergeRequestState::Open
    } else {
        MergeRequestState::Declined
    };

    let mut mr = MergeRequest::new(summary.number, summary.title, state, summary.created_at);
    mr.updated_at = summary.updated_at;
    mr.merged_at = summary.merged_at;
    mr.source_branch = summary.head.name;
    mr.target_branch = summary.base.name;
    if let Some(account) = summary.user {
        mr.author = Some(User::new(Some(account.login.clone()), account.login));
    }
    mr.reviewer_names = summary
        .requested_reviewers
        .into_iter()
        .map(|r| r.login)
        .collect();
    mr.stats = PullRequestStats {
        added_lines: detail.additions,
        removed_lines: detail.deletions,
        changed_files: detail.changed_files,
    };
    mr
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl PlatformAdapter for GithubAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::GitHub
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        let (owner, repo) = parse_owner_repo(request.repository_url())?;
        let key = format!("{}/{}", owner, repo);

        // Read path first; the guard must not live across the fetch below
        let cached = {
            let ids = handle_rwlock_read(self.repo_ids.read(), lock_error)?;
            ids.get(&key).copied()
        };
        if let Some(id) = cached {
            return Ok(RepositoryInfo {
                id: id.to_string(),
                name: repo,
                default_branch: None,
            });
        }

        let base = require_base_url(request)?;
        let url = format!("{}/repos/{}/{}", base, owner, repo);
        let wire: RepositoryWire = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;

        {
            let mut ids = handle_rwlock_write(self.repo_ids.write(), lock_error)?;
            ids.insert(key, wire.id);
        }

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
        let (owner, repo) = parse_owner_repo(request.repository_url())?;
        let base = require_base_url(request)?;
        let auth = Self::auth(request);
        let page_number = page.cursor_number(1);

        let mut url = format!(
            "{}/repos/{}/{}/commits?per_page={}&page={}",
            base, owner, repo, page.per_page, page_number
        );
        if let Some(branch) = request.branch() {
            url.push_str(&format!("&sha={}", urlencoding::encode(branch)));
        }
        if let Some(since) = page.since {
            url.push_str(&format!("&since={}", urlencoding::encode(&format_date(since))));
        }
        if let Some(until) = page.until {
            url.push_str(&format!("&until={}", urlencoding::encode(&format_date(until))));
        }

        let summaries: Vec<CommitSummaryWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;
        let fetched = summaries.len();

        let mut commits = Vec::with_capacity(fetched);
        for summary in summaries {
            let detail_url = format!("{}/repos/{}/{}/commits/{}", base, owner, repo, summary.sha);
            let detail: CommitDetailWire = self
                .client
                .get_json(&detail_url, &auth, request.repository_name())
                .await?;
            let mut commit = convert_commit(detail);
            commit.tool_config_id = request.tool_config_id().to_string();
            commits.push(commit);
        }

        let next = if page.per_page > 0 && fetched == page.per_page {
            Some(PageCursor::Number(page_number + 1))
        } else {
            None
        };
        Ok(Page::with_next(commits, next))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        let (owner, repo) = parse_owner_repo(request.repository_url())?;
        let base = require_base_url(request)?;
        let auth = Self::auth(request);
        let page_number = page.cursor_number(1);

        let url = format!(
            "{}/repos/{}/{}/pulls?state=all&sort=created&direction=desc&per_page={}&page={}",
            base, owner, repo, page.per_page, page_number
        );
        let summaries: Vec<PullSummaryWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;
        let fetched = summaries.len();

        let mut merge_requests = Vec::with_capacity(fetched);
        for summary in summaries {
            let detail_url = format!("{}/repos/{}/{}/pulls/{}", base, owner, repo, summary.number);
            let detail: PullDetailWire = self
                .client
                .get_json(&detail_url, &auth, request.repository_name())
                .await?;
            let mut mr = convert_pull_request(summary, detail);
            mr.tool_config_id = request.tool_config_id().to_string();
            merge_requests.push(mr);
        }

        let next = if page.per_page > 0 && fetched == page.per_page {
            Some(PageCursor::Number(page_number + 1))
        } else {
            None
        };
        Ok(Page::with_next(merge_requests, next))
    }
}

/// GitHub's quota surface: `GET /rate_limit`, core resource
pub struct GithubRateLimitMonitor {
    client: ApiClient,
}

impl GithubRateLimitMonitor {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("github", http.timeout_secs)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitWire {
    resources: RateLimitResourcesWire,
}

#[derive(Debug, Deserialize)]
struct RateLimitResourcesWire {
    core: RateLimitCoreWire,
}

#[derive(Debug, Deserialize)]
struct RateLimitCoreWire {
    limit: u64,
    used: u64,
    remaining: u64,
    reset: i64,
}

#[async_trait]
impl RateLimitMonitor for GithubRateLimitMonitor {
    fn platform(&self) -> &'static str {
        "github"
    }

    async fn check(
        &self,
        token: &str,
        base_url: &str,
    ) -> Result<RateLimitStatus, PlatformApiError> {
        let url = format!("{}/rate_limit", base_url.trim_end_matches('/'));
        let auth = Auth::Bearer(token.to_string());
        let wire: RateLimitWire = self
            .client
            .get_json(&url, &auth, "rate_limit")
            .await
            .map_err(|e| probe_error("github", e))?;
        let core = wire.resources.core;
        Ok(RateLimitStatus {
            platform: "github".to_string(),
            limit: core.limit,
            used: core.used,
            remaining: core.remaining,
            reset_at: DateTime::from_timestamp(core.reset, 0).unwrap_or(DateTime::UNIX_EPOCH),
        })
    }
}
