//! Tests for SCM tool parsing and metadata

use crate::scm::error::ScmError;
use crate::scm::tool::{parse_tool, ScmTool};

#[test]
fn test_parse_canonical_names() {
    assert_eq!(parse_tool("github").unwrap(), ScmTool::GitHub);
    assert_eq!(parse_tool("gitlab").unwrap(), ScmTool::GitLab);
    assert_eq!(parse_tool("bitbucket_cloud").unwrap(), ScmTool::BitbucketCloud);
    assert_eq!(parse_tool("bitbucket_server").unwrap(), ScmTool::BitbucketServer);
    assert_eq!(parse_tool("azure_repos").unwrap(), ScmTool::AzureRepos);
}

#[test]
fn test_parse_aliases() {
    assert_eq!(parse_tool("gh").unwrap(), ScmTool::GitHub);
    assert_eq!(parse_tool("gl").unwrap(), ScmTool::GitLab);
    assert_eq!(parse_tool("bitbucket").unwrap(), ScmTool::BitbucketCloud);
    assert_eq!(parse_tool("stash").unwrap(), ScmTool::BitbucketServer);
    assert_eq!(parse_tool("azure").unwrap(), ScmTool::AzureRepos);
    assert_eq!(parse_tool("azure_devops").unwrap(), ScmTool::AzureRepos);
}

#[test]
fn test_parse_is_case_insensitive_and_trims() {
    assert_eq!(parse_tool("GitHub").unwrap(), ScmTool::GitHub);
    assert_eq!(parse_tool("BITBUCKET").unwrap(), ScmTool::BitbucketCloud);
    assert_eq!(parse_tool("  gitlab  ").unwrap(), ScmTool::GitLab);
}

#[test]
fn test_unknown_tool_is_a_configuration_error() {
    let err = parse_tool("svn").unwrap_err();
    match err {
        ScmError::Configuration { message } => {
            assert!(message.contains("Unknown SCM tool 'svn'"));
            assert!(message.contains("github"), "should list supported tools");
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_display_uses_canonical_name() {
    assert_eq!(ScmTool::GitHub.to_string(), "github");
    assert_eq!(ScmTool::BitbucketServer.to_string(), "bitbucket_server");
    assert_eq!(ScmTool::AzureRepos.to_string(), "azure_repos");
}

#[test]
fn test_default_base_urls() {
    assert_eq!(
        ScmTool::GitHub.default_base_url(),
        Some("https://api.github.com")
    );
    assert_eq!(
        ScmTool::BitbucketCloud.default_base_url(),
        Some("https://api.bitbucket.org/2.0")
    );
    // Self-hosted only: the request must carry an explicit base URL
    assert_eq!(ScmTool::BitbucketServer.default_base_url(), None);
}

#[test]
fn test_serde_accepts_config_aliases() {
    let tool: ScmTool = serde_json::from_str("\"bitbucket\"").unwrap();
    assert_eq!(tool, ScmTool::BitbucketCloud);

    let tool: ScmTool = serde_json::from_str("\"azure_devops\"").unwrap();
    assert_eq!(tool, ScmTool::AzureRepos);

    assert_eq!(
        serde_json::to_string(&ScmTool::GitLab).unwrap(),
        "\"gitlab\""
    );
}

#[test]
fn test_all_lists_every_tool() {
    let all = ScmTool::all();
    assert_eq!(all.len(), 5);
    assert_eq!(all.len(), ScmTool::canonical_names().len());
}
