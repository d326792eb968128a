//! Scan request definition and validation

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::validation::{validate_date_range, validate_repository_url, ValidationError};
use crate::scm::error::{ScmError, ScmResult};
use crate::scm::tool::ScmTool;

/// How far back a scan reaches
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Everything the platform returns, bounded only by explicit dates
    #[strum(to_string = "full")]
    Full,
    /// Resume from the last recorded scan time when one is known
    #[strum(to_string = "incremental")]
    Incremental,
}

/// Everything needed to scan one repository
///
/// Fields are private; construction goes through [`ScanRequest::builder`],
/// which also derives the repository name from the URL when none is given.
#[derive(Clone)]
pub struct ScanRequest {
    repository_url: String,
    repository_name: String,
    tool: ScmTool,
    tool_config_id: String,
    branch: Option<String>,
    username: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    last_scan_from: Option<DateTime<Utc>>,
    strategy: FetchStrategy,
    limit: usize,
    per_page: usize,
    clone_repository: bool,
}

impl ScanRequest {
    pub fn builder(repository_url: impl Into<String>, tool: ScmTool) -> ScanRequestBuilder {
        ScanRequestBuilder {
            repository_url: repository_url.into(),
            repository_name: None,
            tool,
            tool_config_id: "default".to_string(),
            branch: None,
            username: None,
            token: None,
            base_url: None,
            since: None,
            until: None,
            last_scan_from: None,
            strategy: FetchStrategy::Full,
            limit: 0,
            per_page: 50,
            clone_repository: false,
        }
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn tool(&self) -> ScmTool {
        self.tool
    }

    pub fn tool_config_id(&self) -> &str {
        &self.tool_config_id
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    pub fn last_scan_from(&self) -> Option<DateTime<Utc>> {
        self.last_scan_from
    }

    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    /// Maximum records per category, `0` meaning unbounded
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn clone_repository(&self) -> bool {
        self.clone_repository
    }

    /// Lower date bound after applying the fetch strategy
    ///
    /// Incremental scans resume from the last recorded scan time; without
    /// one they behave like full scans.
    pub fn effective_since(&self) -> Option<DateTime<Utc>> {
        match self.strategy {
            FetchStrategy::Incremental => self.last_scan_from.or(self.since),
            FetchStrategy::Full => self.since,
        }
    }

    /// Explicit base URL, or the tool's hosted endpoint
    pub fn effective_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.tool.default_base_url().map(str::to_string))
    }

    /// Checks the request before any network work starts
    pub fn validate(&self) -> ScmResult<()> {
        validate_repository_url(&self.repository_url)?;
        validate_date_range(self.since, self.until)?;
        if self.tool_config_id.trim().is_empty() {
            return Err(ValidationError::new("Tool configuration id cannot be empty").into());
        }
        if self.effective_base_url().is_none() {
            return Err(ScmError::Configuration {
                message: format!(
                    "{} requires an explicit base URL (--base-url)",
                    self.tool.label()
                ),
            });
        }
        Ok(())
    }
}

// Token stays out of logs and debug dumps
impl fmt::Debug for ScanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanRequest")
            .field("repository_url", &self.repository_url)
            .field("repository_name", &self.repository_name)
            .field("tool", &self.tool)
            .field("tool_config_id", &self.tool_config_id)
            .field("branch", &self.branch)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("since", &self.since)
            .field("until", &self.until)
            .field("last_scan_from", &self.last_scan_from)
            .field("strategy", &self.strategy)
            .field("limit", &self.limit)
            .field("per_page", &self.per_page)
            .field("clone_repository", &self.clone_repository)
            .finish()
    }
}

/// Last non-empty path segment of the URL, `.git` trimmed. A URL with no
/// usable path falls back to itself so the name is never empty.
fn derive_repository_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments().and_then(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .last()
                    .map(|s| s.trim_end_matches(".git").to_string())
            })
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| url.trim().to_string())
}

pub struct ScanRequestBuilder {
    repository_url: String,
    repository_name: Option<String>,
    tool: ScmTool,
    tool_config_id: String,
    branch: Option<String>,
    username: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    last_scan_from: Option<DateTime<Utc>>,
    strategy: FetchStrategy,
    limit: usize,
    per_page: usize,
    clone_repository: bool,
}

impl ScanRequestBuilder {
    pub fn repository_name(mut self, name: Option<String>) -> Self {
        self.repository_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn tool_config_id(mut self, id: impl Into<String>) -> Self {
        self.tool_config_id = id.into();
        self
    }

    pub fn branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.until = until;
        self
    }

    pub fn last_scan_from(mut self, last_scan_from: Option<DateTime<Utc>>) -> Self {
        self.last_scan_from = last_scan_from;
        self
    }

    pub fn strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn clone_repository(mut self, clone_repository: bool) -> Self {
        self.clone_repository = clone_repository;
        self
    }

    pub fn build(self) -> ScanRequest {
        let repository_name = self
            .repository_name
            .unwrap_or_else(|| derive_repository_name(&self.repository_url));
        ScanRequest {
            repository_url: self.repository_url,
            repository_name,
            tool: self.tool,
            tool_config_id: self.tool_config_id,
            branch: self.branch,
            username: self.username,
            token: self.token,
            base_url: self.base_url,
            since: self.since,
            until: self.until,
            last_scan_from: self.last_scan_from,
            strategy: self.strategy,
            limit: self.limit,
            per_page: self.per_page,
            clone_repository: self.clone_repository,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(url: &str, tool: ScmTool) -> ScanRequest {
        ScanRequest::builder(url, tool).build()
    }

    #[test]
    fn test_repository_name_derived_from_url() {
        let req = request("https://github.com/acme/widgets.git", ScmTool::GitHub);
        assert_eq!(req.repository_name(), "widgets");

        let req = request("https://gitlab.com/group/sub/tool", ScmTool::GitLab);
        assert_eq!(req.repository_name(), "tool");
    }

    #[test]
    fn test_explicit_repository_name_wins() {
        let req = ScanRequest::builder("https://github.com/acme/widgets", ScmTool::GitHub)
            .repository_name(Some("Widgets (prod)".to_string()))
            .build();
        assert_eq!(req.repository_name(), "Widgets (prod)");

        // Blank names are treated as absent
        let req = ScanRequest::builder("https://github.com/acme/widgets", ScmTool::GitHub)
            .repository_name(Some("   ".to_string()))
            .build();
        assert_eq!(req.repository_name(), "widgets");
    }

    #[test]
    fn test_effective_since_by_strategy() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last_scan = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let req = ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .since(Some(since))
            .last_scan_from(Some(last_scan))
            .strategy(FetchStrategy::Incremental)
            .build();
        assert_eq!(req.effective_since(), Some(last_scan));

        let req = ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .since(Some(since))
            .last_scan_from(Some(last_scan))
            .strategy(FetchStrategy::Full)
            .build();
        assert_eq!(req.effective_since(), Some(since));

        let req = ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .since(Some(since))
            .strategy(FetchStrategy::Incremental)
            .build();
        assert_eq!(req.effective_since(), Some(since));
    }

    #[test]
    fn test_effective_base_url_falls_back_to_hosted_endpoint() {
        let req = request("https://github.com/a/b", ScmTool::GitHub);
        assert_eq!(
            req.effective_base_url().as_deref(),
            Some("https://api.github.com")
        );

        let req = ScanRequest::builder("https://gitlab.example.com/a/b", ScmTool::GitLab)
            .base_url(Some("https://gitlab.example.com".to_string()))
            .build();
        assert_eq!(
            req.effective_base_url().as_deref(),
            Some("https://gitlab.example.com")
        );

        let req = request(
            "https://stash.example.com/scm/AC/widgets.git",
            ScmTool::BitbucketServer,
        );
        assert!(req.effective_base_url().is_none());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(request("https://github.com/a/b", ScmTool::GitHub)
            .validate()
            .is_ok());

        assert!(request("git@github.com:a/b.git", ScmTool::GitHub)
            .validate()
            .is_err());

        // Self-hosted platform without a base URL
        let err = request(
            "https://stash.example.com/scm/AC/widgets.git",
            ScmTool::BitbucketServer,
        )
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("--base-url"));

        let since = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .since(Some(since))
            .until(Some(until))
            .build()
            .validate()
            .is_err());

        assert!(ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .tool_config_id("  ")
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let req = ScanRequest::builder("https://github.com/a/b", ScmTool::GitHub)
            .token(Some("secret-token".to_string()))
            .build();
        let dump = format!("{:?}", req);
        assert!(!dump.contains("secret-token"));
        assert!(dump.contains("***"));
    }

    #[test]
    fn test_fetch_strategy_parses() {
        assert_eq!("full".parse::<FetchStrategy>(), Ok(FetchStrategy::Full));
        assert_eq!(
            "Incremental".parse::<FetchStrategy>(),
            Ok(FetchStrategy::Incremental)
        );
        assert!("weekly".parse::<FetchStrategy>().is_err());
    }
}
