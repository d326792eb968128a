//! Bitbucket Cloud Adapter
//!
//! API 2.0 against `api.bitbucket.org`. Unlike the other platforms,
//! pagination hands back a complete continuation URL (`next`), carried as a
//! token cursor, and diffs arrive as raw unified text rather than JSON.
//! The commits endpoint has no server-side date filter; date bounds are
//! applied by the fetcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::client::{ApiClient, Auth};
use super::traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};
use super::{require_base_url, url_path_segments};
use crate::core::config::HttpConfig;
use crate::diff::unified;
use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::tool::ScmTool;
use crate::scm::types::{
    Commit, FileChange, MergeRequest, MergeRequestState, PullRequestStats, User,
};

pub struct BitbucketCloudAdapter {
    client: ApiClient,
}

impl BitbucketCloudAdapter {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("bitbucket_cloud", http.timeout_secs)?,
        })
    }

    /// App passwords use basic auth with the account username; a lone token
    /// is treated as a bearer credential
    fn auth(request: &ScanRequest) -> Auth {
        match (request.username(), request.token()) {
            (Some(username), Some(token)) if !token.trim().is_empty() => Auth::Basic {
                username: username.to_string(),
                password: token.to_string(),
            },
            (None, Some(token)) if !token.trim().is_empty() => Auth::Bearer(token.to_string()),
            _ => Auth::None,
        }
    }
}

/// `workspace` and repository `slug` from a Bitbucket Cloud URL
pub fn parse_workspace_slug(url: &str) -> ScmResult<(String, String)> {
    let segments = url_path_segments(url, 2)?;
    let workspace = segments[0].clone();
    let slug = segments[1].trim_end_matches(".git").to_string();
    Ok((workspace, slug))
}

#[derive(Debug, Deserialize)]
pub struct PageWire<T> {
    #[serde(default)]
    pub values: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryWire {
    uuid: Option<String>,
    name: Option<String>,
    mainbranch: Option<MainBranchWire>,
}

#[derive(Debug, Deserialize)]
struct MainBranchWire {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitWire {
    pub hash: String,
    #[serde(default)]
    pub message: String,
    pub date: DateTime<Utc>,
    pub author: Option<CommitAuthorWire>,
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthorWire {
    #[serde(default)]
    pub raw: String,
    pub user: Option<AccountWire>,
}

#[derive(Debug, Deserialize)]
pub struct AccountWire {
    pub display_name: Option<String>,
    pub nickname: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PullRequestWire {
    pub id: u64,
    pub title: String,
    pub state: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    pub source: Option<RefWire>,
    pub destination: Option<RefWire>,
    pub author: Option<AccountWire>,
    #[serde(default)]
    pub reviewers: Vec<AccountWire>,
}

#[derive(Debug, Deserialize)]
pub struct RefWire {
    pub branch: Option<BranchWire>,
}

#[derive(Debug, Deserialize)]
pub struct BranchWire {
    pub name: Option<String>,
}

/// Split a `"Name <email>"` raw author into its parts
pub fn parse_raw_author(raw: &str) -> (String, Option<String>) {
    if let (Some(open), Some(close)) = (raw.find('<'), raw.rfind('>')) {
        if open < close {
            let name = raw[..open].trim().to_string();
            let email = raw[open + 1..close].trim().to_string();
            let email = if email.is_empty() { None } else { Some(email) };
            return (name, email);
        }
    }
    (raw.trim().to_string(), None)
}

fn account_username(account: &AccountWire) -> Option<String> {
    account
        .nickname
        .clone()
        .or_else(|| account.account_id.clone())
}

pub fn convert_commit(wire: CommitWire, files: Vec<FileChange>) -> Commit {
    let mut commit = Commit::new(wire.hash, wire.message, wire.date);

    if let Some(author) = wire.author {
        let (name, email) = parse_raw_author(&author.raw);
        commit.author_name = name.clone();
        commit.author_email = email.clone().unwrap_or_default();
        // The platform reports a single author; mirror it as the committer
        commit.committer_name = name.clone();
        commit.committer_email = commit.author_email.clone();

        if let Some(account) = author.user {
            let display = account
                .display_name
                .clone()
                .unwrap_or_else(|| name.clone());
            commit.author =
                Some(User::new(account_username(&account), display).with_email(email));
        }
    }

    commit.file_changes = files;
    commit
}

pub fn convert_pull_request(wire: PullRequestWire, stats: PullRequestStats) -> MergeRequest {
    let state = match wire.state.to_ascii_uppercase().as_str() {
        "MERGED" => MergeRequestState::Merged,
        "OPEN" => MergeRequestState::Open,
        _ => MergeRequestState::Declined,
    };

    let mut mr = MergeRequest::new(wire.id, wire.title, state, wire.created_on);
    mr.updated_at = wire.updated_on;
    // The API exposes no merge timestamp; the last update of a merged PR is
    // the closest available signal
    if state == MergeRequestState::Merged {
        mr.merged_at = wire.updated_on;
    }
    mr.source_branch = wire
        .source
        .and_then(|r| r.branch)
        .and_then(|b| b.name)
        .unwrap_or_default();
    mr.target_branch = wire
        .destination
        .and_then(|r| r.branch)
        .and_then(|b| b.name)
        .unwrap_or_default();
    if let Some(account) = wire.author {
        let display = account
            .display_name
            .clone()
            .or_else(|| account.nickname.clone())
            .unwrap_or_default();
        mr.author = Some(User::new(account_username(&account), display));
    }
    mr.reviewer_names = wire
        .reviewers
        .iter()
        .filter_map(|r| account_username(r).or_else(|| r.display_name.clone()))
        .collect();
    mr.stats = stats;
    mr
}

#[async_trait]
impl PlatformAdapter for BitbucketCloudAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::BitbucketCloud
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        let base = require_base_url(request)?;
        let (workspace, slug) = parse_workspace_slug(request.repository_url())?;
        let url = format!("{}/repositories/{}/{}", base, workspace, slug);
        let wire: RepositoryWire = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;
        Ok(RepositoryInfo {
            id: wire.uuid.unwrap_or_else(|| slug.clone()),
            name: wire.name.unwrap_or(slug),
            default_branch: wire.mainbranch.and_then(|b| b.name),
        })
    }

    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<Commit>> {
        let base = require_base_url(request)?;
        let (workspace, slug) = parse_workspace_slug(request.repository_url())?;
        let auth = Self::auth(request);

        let url = match &page.cursor {
            Some(PageCursor::Token(next)) => next.clone(),
            _ => {
                let mut url = format!("{}/repositories/{}/{}/commits", base, workspace, slug);
                if let Some(branch) = request.branch() {
                    url.push_str(&format!("/{}", urlencoding::encode(branch)));
                }
                url.push_str(&format!("?pagelen={}", page.per_page));
                url
            }
        };

        let wire: PageWire<CommitWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;

        let mut commits = Vec::with_capacity(wire.values.len());
        for summary in wire.values {
            let diff_url = format!(
                "{}/repositories/{}/{}/diff/{}",
                base, workspace, slug, summary.hash
            );
            let diff_text = self
                .client
                .get_text(&diff_url, &auth, request.repository_name())
                .await?;
            let files = unified::parse_file_changes(&diff_text);
            let mut commit = convert_commit(summary, files);
            commit.tool_config_id = request.tool_config_id().to_string();
            commits.push(commit);
        }

        Ok(Page::with_next(commits, wire.next.map(PageCursor::Token)))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        let base = require_base_url(request)?;
        let (workspace, slug) = parse_workspace_slug(request.repository_url())?;
        let auth = Self::auth(request);

        let url = match &page.cursor {
            Some(PageCursor::Token(next)) => next.clone(),
            _ => format!(
                "{}/repositories/{}/{}/pullrequests?state=OPEN&state=MERGED&state=DECLINED&pagelen={}",
                base, workspace, slug, page.per_page
            ),
        };

        let wire: PageWire<PullRequestWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;

        let mut merge_requests = Vec::with_capacity(wire.values.len());
        for summary in wire.values {
            // The list payload omits reviewers; the detail call carries them
            let detail_url = format!(
                "{}/repositories/{}/{}/pullrequests/{}",
                base, workspace, slug, summary.id
            );
            let detail: PullRequestWire = self
                .client
                .get_json(&detail_url, &auth, request.repository_name())
                .await?;

            let diff_url = format!(
                "{}/repositories/{}/{}/pullrequests/{}/diff",
                base, workspace, slug, summary.id
            );
            let diff_text = self
                .client
                .get_text(&diff_url, &auth, request.repository_name())
                .await?;
            let stats = unified::parse_pull_request_stats(&diff_text);

            let mut mr = convert_pull_request(detail, stats);
            mr.tool_config_id = request.tool_config_id().to_string();
            merge_requests.push(mr);
        }

        Ok(Page::with_next(
            merge_requests,
            wire.next.map(PageCursor::Token),
        ))
    }
}
