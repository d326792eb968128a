//! SCM Platform Identification
//!
//! [`ScmTool`] is the enum key for every platform-specific component: adapter
//! registration, rate limit monitors, and request validation all dispatch on
//! it. Tool names from the CLI or config files parse case-insensitively with
//! the aliases each platform is commonly configured under; unknown names are
//! a typed configuration error, never a silent default.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::error::{ScmError, ScmResult};

/// Supported SCM platforms
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum ScmTool {
    #[serde(rename = "github")]
    #[strum(to_string = "github", serialize = "gh")]
    GitHub,

    #[serde(rename = "gitlab")]
    #[strum(to_string = "gitlab", serialize = "gl")]
    GitLab,

    #[serde(rename = "bitbucket_cloud", alias = "bitbucket")]
    #[strum(to_string = "bitbucket_cloud", serialize = "bitbucket")]
    BitbucketCloud,

    #[serde(rename = "bitbucket_server", alias = "stash")]
    #[strum(to_string = "bitbucket_server", serialize = "stash")]
    BitbucketServer,

    #[serde(rename = "azure_repos", alias = "azure", alias = "azure_devops")]
    #[strum(to_string = "azure_repos", serialize = "azure", serialize = "azure_devops")]
    AzureRepos,
}

impl ScmTool {
    /// Human-readable platform name for log and summary output
    pub fn label(&self) -> &'static str {
        match self {
            ScmTool::GitHub => "GitHub",
            ScmTool::GitLab => "GitLab",
            ScmTool::BitbucketCloud => "Bitbucket Cloud",
            ScmTool::BitbucketServer => "Bitbucket Server",
            ScmTool::AzureRepos => "Azure Repos",
        }
    }

    /// API base URL used when the request does not override it
    ///
    /// Bitbucket Server has no hosted instance, so requests targeting it must
    /// carry an explicit `base_url`.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ScmTool::GitHub => Some("https://api.github.com"),
            ScmTool::GitLab => Some("https://gitlab.com"),
            ScmTool::BitbucketCloud => Some("https://api.bitbucket.org/2.0"),
            ScmTool::BitbucketServer => None,
            ScmTool::AzureRepos => Some("https://dev.azure.com"),
        }
    }

    /// All supported tools in declaration order
    pub fn all() -> Vec<ScmTool> {
        ScmTool::iter().collect()
    }

    /// Canonical names accepted on the command line
    pub fn canonical_names() -> Vec<&'static str> {
        vec![
            "github",
            "gitlab",
            "bitbucket_cloud",
            "bitbucket_server",
            "azure_repos",
        ]
    }
}

/// Parse a tool name from user input
///
/// Accepts canonical names and aliases, case-insensitively, with surrounding
/// whitespace ignored.
pub fn parse_tool(name: &str) -> ScmResult<ScmTool> {
    name.trim().parse::<ScmTool>().map_err(|_| {
        let supported = ScmTool::canonical_names().join(", ");
        ScmError::Configuration {
            message: format!("Unknown SCM tool '{}'. Supported tools: {}", name, supported),
        }
    })
}
