//! Bitbucket Server Adapter
//!
//! Self-hosted instances only, so an explicit base URL is mandatory. The
//! REST 1.0 surface paginates with `isLastPage`/`nextPageStart` offsets,
//! reports timestamps as epoch milliseconds, and describes diffs as the
//! structured JSON document handled by the structured parser. Commit
//! history has no server-side date filter; bounds are applied by the
//! fetcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::client::{ApiClient, Auth};
use super::traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};
use super::{invalid_url, require_base_url, url_path_segments};
use crate::core::config::HttpConfig;
use crate::diff::structured;
use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::tool::ScmTool;
use crate::scm::types::{Commit, FileChange, MergeRequest, MergeRequestState, User};

pub struct BitbucketServerAdapter {
    client: ApiClient,
}

impl BitbucketServerAdapter {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("bitbucket_server", http.timeout_secs)?,
        })
    }

    fn auth(request: &ScanRequest) -> Auth {
        match request.token() {
            Some(token) if !token.trim().is_empty() => Auth::Bearer(token.to_string()),
            _ => Auth::None,
        }
    }

    fn api_root(base: &str) -> String {
        format!("{}/rest/api/1.0", base.trim_end_matches('/'))
    }
}

/// Project key and repository slug from a Bitbucket Server URL
///
/// Two shapes occur in the wild: clone URLs (`.../scm/KEY/slug.git`) and
/// browser URLs (`.../projects/KEY/repos/slug`), optionally under a
/// context path.
pub fn parse_project_repo(url: &str) -> ScmResult<(String, String)> {
    let segments = url_path_segments(url, 2)?;

    if let Some(pos) = segments.iter().position(|s| s == "scm") {
        if segments.len() >= pos + 3 {
            let key = segments[pos + 1].clone();
            let slug = segments[pos + 2].trim_end_matches(".git").to_string();
            return Ok((key, slug));
        }
    }

    if let Some(pos) = segments.iter().position(|s| s == "projects") {
        if segments.len() >= pos + 4 && segments[pos + 2] == "repos" {
            let key = segments[pos + 1].clone();
            let slug = segments[pos + 3].trim_end_matches(".git").to_string();
            return Ok((key, slug));
        }
    }

    Err(invalid_url(url))
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWire<T> {
    #[serde(default)]
    pub values: Vec<T>,
    #[serde(default)]
    pub is_last_page: bool,
    pub next_page_start: Option<u32>,
}

impl<T> PageWire<T> {
    fn next_cursor(&self) -> Option<PageCursor> {
        if self.is_last_page {
            None
        } else {
            self.next_page_start.map(PageCursor::Number)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryWire {
    id: Option<u64>,
    slug: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitWire {
    pub id: String,
    #[serde(default)]
    pub message: String,
    pub author_timestamp: i64,
    pub author: Option<PersonWire>,
    pub committer: Option<PersonWire>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonWire {
    pub name: Option<String>,
    pub email_address: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestWire {
    pub id: u64,
    pub title: String,
    pub state: String,
    pub created_date: i64,
    pub updated_date: Option<i64>,
    pub from_ref: Option<RefWire>,
    pub to_ref: Option<RefWire>,
    pub author: Option<ParticipantWire>,
    #[serde(default)]
    pub reviewers: Vec<ParticipantWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefWire {
    pub display_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantWire {
    pub user: Option<PersonWire>,
}

fn person_user(person: &PersonWire) -> Option<User> {
    let username = person.name.clone()?;
    let display = person
        .display_name
        .clone()
        .unwrap_or_else(|| username.clone());
    Some(User::new(Some(username), display).with_email(person.email_address.clone()))
}

pub fn convert_commit(wire: CommitWire, files: Vec<FileChange>) -> Commit {
    let timestamp = from_millis(wire.author_timestamp);
    let mut commit = Commit::new(wire.id, wire.message, timestamp);

    let author = wire.author.clone().unwrap_or_default();
    let committer = wire.committer.or(wire.author).unwrap_or_default();
    commit.author_name = author
        .display_name
        .clone()
        .or_else(|| author.name.clone())
        .unwrap_or_default();
    commit.author_email = author.email_address.clone().unwrap_or_default();
    commit.committer_name = committer
        .display_name
        .clone()
        .or_else(|| committer.name.clone())
        .unwrap_or_default();
    commit.committer_email = committer.email_address.unwrap_or_default();
    commit.author = person_user(&author);
    commit.file_changes = files;
    commit
}

pub fn convert_pull_request(wire: PullRequestWire) -> MergeRequest {
    let state = match wire.state.to_ascii_uppercase().as_str() {
        "MERGED" => MergeRequestState::Merged,
        "OPEN" => MergeRequestState::Open,
        _ => MergeRequestState::Declined,
    };

    let mut mr = MergeRequest::new(wire.id, wire.title, state, from_millis(wire.created_date));
    mr.updated_at = wire.updated_date.map(from_millis);
    if state == MergeRequestState::Merged {
        mr.merged_at = mr.updated_at;
    }
    mr.source_branch = wire
        .from_ref
        .and_then(|r| r.display_id)
        .unwrap_or_default();
    mr.target_branch = wire.to_ref.and_then(|r| r.display_id).unwrap_or_default();
    mr.author = wire
        .author
        .and_then(|p| p.user)
        .as_ref()
        .and_then(person_user);
    mr.reviewer_names = wire
        .reviewers
        .iter()
        .filter_map(|p| p.user.as_ref().and_then(|u| u.name.clone()))
        .collect();
    mr
}

#[async_trait]
impl PlatformAdapter for BitbucketServerAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::BitbucketServer
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        let root = Self::api_root(&require_base_url(request)?);
        let (key, slug) = parse_project_repo(request.repository_url())?;
        let url = format!("{}/projects/{}/repos/{}", root, key, slug);
        let wire: RepositoryWire = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;
        Ok(RepositoryInfo {
            id: wire
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| slug.clone()),
            name: wire.name.or(wire.slug).unwrap_or(slug),
            default_branch: None,
        })
    }

    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<Commit>> {
        let root = Self::api_root(&require_base_url(request)?);
        let (key, slug) = parse_project_repo(request.repository_url())?;
        let auth = Self::auth(request);
        let start = page.cursor_number(0);

        let mut url = format!(
            "{}/projects/{}/repos/{}/commits?limit={}&start={}",
            root, key, slug, page.per_page, start
        );
        if let Some(branch) = request.branch() {
            // `until` here is a ref, not a date
            url.push_str(&format!("&until={}", urlencoding::encode(branch)));
        }

        let wire: PageWire<CommitWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;
        let next = wire.next_cursor();

        let mut commits = Vec::with_capacity(wire.values.len());
        for summary in wire.values {
            let diff_url = format!(
                "{}/projects/{}/repos/{}/commits/{}/diff",
                root, key, slug, summary.id
            );
            let raw = self
                .client
                .get_text(&diff_url, &auth, request.repository_name())
                .await?;
            let outcome = structured::parse_file_changes(&raw)?;
            for skip in &outcome.skipped {
                log::warn!(
                    "Skipping diff entry for commit {} in '{}': {}",
                    summary.id,
                    request.repository_name(),
                    skip
                );
            }
            let mut commit = convert_commit(summary, outcome.changes);
            commit.tool_config_id = request.tool_config_id().to_string();
            commits.push(commit);
        }

        Ok(Page::with_next(commits, next))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        let root = Self::api_root(&require_base_url(request)?);
        let (key, slug) = parse_project_repo(request.repository_url())?;
        let auth = Self::auth(request);
        let start = page.cursor_number(0);

        let url = format!(
            "{}/projects/{}/repos/{}/pull-requests?state=ALL&limit={}&start={}",
            root, key, slug, page.per_page, start
        );
        let wire: PageWire<PullRequestWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;
        let next = wire.next_cursor();

        let mut merge_requests = Vec::with_capacity(wire.values.len());
        for summary in wire.values {
            let diff_url = format!(
                "{}/projects/{}/repos/{}/pull-requests/{}/diff",
                root, key, slug, summary.id
            );
            let raw = self
                .client
                .get_text(&diff_url, &auth, request.repository_name())
                .await?;
            let stats = structured::parse_pull_request_stats(&raw)?;

            let mut mr = convert_pull_request(summary);
            mr.stats = stats;
            mr.tool_config_id = request.tool_config_id().to_string();
            merge_requests.push(mr);
        }

        Ok(Page::with_next(merge_requests, next))
    }
}
