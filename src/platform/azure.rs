//! Azure Repos Adapter
//!
//! Talks to the Azure DevOps Git REST API (`api-version=7.1`). Repository
//! URLs carry an organization, a project, and a repository name; both the
//! `dev.azure.com/{org}` and the legacy `{org}.visualstudio.com` hosts
//! are recognized. Commit listings support server-side date filtering
//! through `searchCriteria.fromDate`/`toDate`, and pagination is plain
//! `$top`/`$skip` offsets with no continuation marker, so the next page
//! is inferred from a full current page.
//!
//! Azure exposes per-file change kinds but no line counts, and no
//! aggregate pull request stats. File changes are recorded with zero
//! line counts, and pull request stats stay at their defaults.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::client::{ApiClient, Auth};
use super::traits::{Page, PageCursor, PageRequest, PlatformAdapter, RepositoryInfo};
use super::{invalid_url, require_base_url};
use crate::core::config::HttpConfig;
use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::tool::ScmTool;
use crate::scm::types::{ChangeType, Commit, FileChange, MergeRequest, MergeRequestState, User};

const API_VERSION: &str = "7.1";

pub struct AzureReposAdapter {
    client: ApiClient,
}

impl AzureReposAdapter {
    pub fn new(http: &HttpConfig) -> ScmResult<Self> {
        Ok(Self {
            client: ApiClient::new("azure_repos", http.timeout_secs)?,
        })
    }

    fn auth(request: &ScanRequest) -> Auth {
        match request.token() {
            // PATs go through basic auth; the username side is ignored
            Some(token) if !token.trim().is_empty() => Auth::Basic {
                username: String::new(),
                password: token.to_string(),
            },
            _ => Auth::None,
        }
    }

    fn api_root(base: &str, org: &str, project: &str, repo: &str) -> String {
        format!(
            "{}/{}/{}/_apis/git/repositories/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(org),
            urlencoding::encode(project),
            urlencoding::encode(repo)
        )
    }
}

/// Organization, project, and repository from an Azure Repos URL
///
/// Accepts `https://dev.azure.com/{org}/{project}/_git/{repo}` and
/// `https://{org}.visualstudio.com/{project}/_git/{repo}`.
pub fn parse_org_project_repo(url: &str) -> ScmResult<(String, String, String)> {
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid_url(url))?;
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|parts| {
            parts
                .filter(|s| !s.is_empty())
                .map(|s| {
                    urlencoding::decode(s)
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let git_pos = segments
        .iter()
        .position(|s| s == "_git")
        .ok_or_else(|| invalid_url(url))?;
    if git_pos == 0 || git_pos + 1 >= segments.len() {
        return Err(invalid_url(url));
    }
    let repo = segments[git_pos + 1].trim_end_matches(".git").to_string();
    let project = segments[git_pos - 1].clone();

    let host = parsed.host_str().unwrap_or_default();
    let org = if let Some(prefix) = host.strip_suffix(".visualstudio.com") {
        prefix.to_string()
    } else if git_pos >= 2 {
        segments[git_pos - 2].clone()
    } else {
        return Err(invalid_url(url));
    };

    Ok((org, project, repo))
}

fn format_date(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn strip_ref(name: &str) -> String {
    name.strip_prefix("refs/heads/").unwrap_or(name).to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListWire<T> {
    #[serde(default)]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryWire {
    id: Option<String>,
    name: Option<String>,
    default_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitWire {
    pub commit_id: String,
    #[serde(default)]
    pub comment: String,
    pub author: Option<SignatureWire>,
    pub committer: Option<SignatureWire>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureWire {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangesWire {
    #[serde(default)]
    pub changes: Vec<ChangeWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeWire {
    pub item: Option<ItemWire>,
    #[serde(default)]
    pub change_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWire {
    pub path: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestWire {
    pub pull_request_id: u64,
    pub title: String,
    #[serde(default)]
    pub status: String,
    pub creation_date: DateTime<Utc>,
    pub closed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_ref_name: String,
    #[serde(default)]
    pub target_ref_name: String,
    pub created_by: Option<IdentityWire>,
    #[serde(default)]
    pub reviewers: Vec<IdentityWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityWire {
    pub display_name: Option<String>,
    pub unique_name: Option<String>,
}

/// Maps Azure change kinds. Compound kinds such as `edit, rename`
/// occur, so this matches on substrings.
pub fn map_change_type(kind: &str) -> ChangeType {
    let kind = kind.to_ascii_lowercase();
    if kind.contains("add") {
        ChangeType::Added
    } else if kind.contains("delete") {
        ChangeType::Deleted
    } else if kind == "none" {
        ChangeType::Unchanged
    } else {
        ChangeType::Modified
    }
}

pub fn convert_change(wire: ChangeWire) -> Option<FileChange> {
    let item = wire.item?;
    if item.is_folder {
        return None;
    }
    let path = item.path?;
    let mut change = FileChange::new(path.trim_start_matches('/'), 0, 0);
    change.change_type = map_change_type(&wire.change_type);
    Some(change)
}

fn signature_user(signature: &SignatureWire) -> Option<User> {
    let name = signature.name.clone()?;
    Some(User::new(Some(name.clone()), name).with_email(signature.email.clone()))
}

pub fn convert_commit(wire: CommitWire, files: Vec<FileChange>) -> Commit {
    let author = wire.author.clone().unwrap_or_default();
    let committer = wire.committer.or(wire.author).unwrap_or_default();
    let timestamp = author
        .date
        .or(committer.date)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let mut commit = Commit::new(wire.commit_id, wire.comment, timestamp);
    commit.author_name = author.name.clone().unwrap_or_default();
    commit.author_email = author.email.clone().unwrap_or_default();
    commit.committer_name = committer.name.unwrap_or_default();
    commit.committer_email = committer.email.unwrap_or_default();
    commit.author = signature_user(&author);
    commit.file_changes = files;
    commit
}

fn identity_user(identity: &IdentityWire) -> Option<User> {
    let username = identity
        .unique_name
        .clone()
        .or_else(|| identity.display_name.clone())?;
    let display = identity
        .display_name
        .clone()
        .unwrap_or_else(|| username.clone());
    Some(User::new(Some(username), display))
}

pub fn convert_pull_request(wire: PullRequestWire) -> MergeRequest {
    let state = match wire.status.as_str() {
        "completed" => MergeRequestState::Merged,
        "abandoned" => MergeRequestState::Declined,
        _ => MergeRequestState::Open,
    };

    let mut mr = MergeRequest::new(wire.pull_request_id, wire.title, state, wire.creation_date);
    if state == MergeRequestState::Merged {
        mr.merged_at = wire.closed_date;
    }
    mr.source_branch = strip_ref(&wire.source_ref_name);
    mr.target_branch = strip_ref(&wire.target_ref_name);
    mr.author = wire.created_by.as_ref().and_then(identity_user);
    mr.reviewer_names = wire
        .reviewers
        .iter()
        .filter_map(|r| r.unique_name.clone().or_else(|| r.display_name.clone()))
        .collect();
    mr
}

#[async_trait]
impl PlatformAdapter for AzureReposAdapter {
    fn tool(&self) -> ScmTool {
        ScmTool::AzureRepos
    }

    async fn fetch_repository(&self, request: &ScanRequest) -> ScmResult<RepositoryInfo> {
        let base = require_base_url(request)?;
        let (org, project, repo) = parse_org_project_repo(request.repository_url())?;
        let root = Self::api_root(&base, &org, &project, &repo);
        let url = format!("{}?api-version={}", root, API_VERSION);
        let wire: RepositoryWire = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;
        Ok(RepositoryInfo {
            id: wire.id.unwrap_or_else(|| repo.clone()),
            name: wire.name.unwrap_or(repo),
            default_branch: wire.default_branch.as_deref().map(strip_ref),
        })
    }

    async fn fetch_commits(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<Commit>> {
        let base = require_base_url(request)?;
        let (org, project, repo) = parse_org_project_repo(request.repository_url())?;
        let root = Self::api_root(&base, &org, &project, &repo);
        let auth = Self::auth(request);
        let skip = page.cursor_number(0);

        let mut url = format!(
            "{}/commits?searchCriteria.$top={}&searchCriteria.$skip={}&api-version={}",
            root, page.per_page, skip, API_VERSION
        );
        if let Some(branch) = request.branch() {
            url.push_str(&format!(
                "&searchCriteria.itemVersion.version={}",
                urlencoding::encode(branch)
            ));
        }
        if let Some(since) = &page.since {
            url.push_str(&format!(
                "&searchCriteria.fromDate={}",
                urlencoding::encode(&format_date(since))
            ));
        }
        if let Some(until) = &page.until {
            url.push_str(&format!(
                "&searchCriteria.toDate={}",
                urlencoding::encode(&format_date(until))
            ));
        }

        let wire: ListWire<CommitWire> = self
            .client
            .get_json(&url, &auth, request.repository_name())
            .await?;
        let fetched = wire.value.len();

        let mut commits = Vec::with_capacity(fetched);
        for summary in wire.value {
            let changes_url = format!(
                "{}/commits/{}/changes?api-version={}",
                root, summary.commit_id, API_VERSION
            );
            let changes: ChangesWire = self
                .client
                .get_json(&changes_url, &auth, request.repository_name())
                .await?;
            let files = changes
                .changes
                .into_iter()
                .filter_map(convert_change)
                .collect();
            let mut commit = convert_commit(summary, files);
            commit.tool_config_id = request.tool_config_id().to_string();
            commits.push(commit);
        }

        let next = (page.per_page > 0 && fetched == page.per_page)
            .then(|| PageCursor::Number(skip + page.per_page as u32));
        Ok(Page::with_next(commits, next))
    }

    async fn fetch_merge_requests(
        &self,
        request: &ScanRequest,
        page: &PageRequest,
    ) -> ScmResult<Page<MergeRequest>> {
        let base = require_base_url(request)?;
        let (org, project, repo) = parse_org_project_repo(request.repository_url())?;
        let root = Self::api_root(&base, &org, &project, &repo);
        let skip = page.cursor_number(0);

        let url = format!(
            "{}/pullrequests?searchCriteria.status=all&$top={}&$skip={}&api-version={}",
            root, page.per_page, skip, API_VERSION
        );
        let wire: ListWire<PullRequestWire> = self
            .client
            .get_json(&url, &Self::auth(request), request.repository_name())
            .await?;
        let fetched = wire.value.len();

        let merge_requests = wire
            .value
            .into_iter()
            .map(|summary| {
                let mut mr = convert_pull_request(summary);
                mr.tool_config_id = request.tool_config_id().to_string();
                mr
            })
            .collect();

        let next = (page.per_page > 0 && fetched == page.per_page)
            .then(|| PageCursor::Number(skip + page.per_page as u32));
        Ok(Page::with_next(merge_requests, next))
    }
}
