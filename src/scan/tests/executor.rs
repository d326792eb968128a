//! End-to-end pipeline tests against the stub adapter

use super::fixtures::{
    commit, day, github_request, harness, merge_request, user, StubAdapter,
};
use crate::core::shutdown::CancelFlag;
use crate::scan::request::ScanRequest;
use crate::scan::status::ScanStatus;
use crate::scm::tool::ScmTool;

#[tokio::test]
async fn test_empty_scan_completes_without_touching_persistence() {
    let fixture = harness(StubAdapter::empty());
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(result.success);
    assert_eq!(result.status, ScanStatus::Completed);
    assert_eq!(result.commits_found, 0);
    assert_eq!(result.merge_requests_found, 0);
    assert_eq!(result.users_found, 0);
    assert!(result.error.is_none());

    assert_eq!(fixture.persistence.save_commit_calls().unwrap(), 0);
    assert_eq!(fixture.persistence.save_merge_request_calls().unwrap(), 0);
    assert!(fixture.persistence.users().unwrap().is_empty());
}

#[tokio::test]
async fn test_happy_path_persists_resolved_records() {
    let alice = user("alice", "alice");
    let bob = user("bob", "Bob Jones");
    let adapter = StubAdapter::serving(
        vec![vec![
            commit("c1", 5, Some(alice.clone())),
            commit("c2", 4, Some(alice.clone())),
        ]],
        vec![vec![merge_request(7, Some(bob), &["carol"])]],
    );
    let fixture = harness(adapter);
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(result.success, "unexpected error: {:?}", result.error);
    assert_eq!(result.status, ScanStatus::Completed);
    assert_eq!(result.repository_name, "widgets");
    assert_eq!(result.commits_found, 2);
    assert_eq!(result.merge_requests_found, 1);
    assert_eq!(result.users_found, 3, "alice, bob, and the carol reviewer");
    assert!(result.scan_id.starts_with("scan-"));
    assert!(result
        .scan_id
        .ends_with(&day(10).timestamp_millis().to_string()));
    assert_eq!(result.started_at, day(10).timestamp_millis());

    let users = fixture.persistence.users().unwrap();
    let usernames: Vec<_> = users.iter().filter_map(|u| u.username.clone()).collect();
    assert_eq!(usernames, ["alice", "bob", "carol"]);

    let commits = fixture.persistence.commits().unwrap();
    assert_eq!(commits.len(), 2);
    for persisted in &commits {
        assert_eq!(persisted.repository_name, "widgets");
        let author_ref = persisted.author_ref.as_ref().unwrap();
        assert_eq!(author_ref.username.as_deref(), Some("alice"));
        assert!(persisted.committer_ref.is_some());
    }

    let merge_requests = fixture.persistence.merge_requests().unwrap();
    assert_eq!(merge_requests.len(), 1);
    let mr = &merge_requests[0];
    assert_eq!(mr.repository_name, "widgets");
    assert_eq!(
        mr.author_ref.as_ref().unwrap().username.as_deref(),
        Some("bob")
    );
    assert_eq!(mr.reviewer_refs.len(), 1);
    assert_eq!(mr.reviewer_refs[0].username.as_deref(), Some("carol"));
}

#[tokio::test]
async fn test_fetch_failure_wraps_repository_context() {
    let fixture = harness(StubAdapter::empty().failing_commits());
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(!result.success);
    assert_eq!(result.status, ScanStatus::Failed);
    let message = result.error.unwrap();
    assert!(message.contains("widgets"), "missing name: {}", message);
    assert!(
        message.contains("https://github.com/acme/widgets"),
        "missing url: {}",
        message
    );
    assert!(message.contains("commit listing failed"));

    assert_eq!(fixture.persistence.save_commit_calls().unwrap(), 0);
    assert!(fixture.persistence.users().unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_request_failure_persists_nothing() {
    let alice = user("alice", "alice");
    let adapter = StubAdapter::serving(
        vec![vec![commit("c1", 5, Some(alice))]],
        Vec::new(),
    )
    .failing_merge_requests();
    let fixture = harness(adapter);
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(!result.success);
    assert_eq!(result.status, ScanStatus::Failed);
    // Fetched commits are discarded; nothing from a failed scan lands
    assert_eq!(fixture.persistence.save_commit_calls().unwrap(), 0);
    assert!(fixture.persistence.commits().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_first_page_reports_cancelled() {
    let fixture = harness(StubAdapter::empty());
    let request = github_request("https://github.com/acme/widgets");
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = fixture.executor.execute(&request, cancel).await;

    assert!(!result.success);
    assert_eq!(result.status, ScanStatus::Cancelled);
    let message = result.error.unwrap();
    assert!(message.contains("cancelled"), "got: {}", message);
    assert!(message.contains("widgets"));

    assert_eq!(fixture.adapter.commit_call_count(), 0);
    assert_eq!(fixture.persistence.save_commit_calls().unwrap(), 0);
    assert!(fixture.persistence.users().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_adapter_is_a_configuration_failure() {
    let fixture = harness(StubAdapter::empty());
    let request = ScanRequest::builder("https://gitlab.com/acme/widgets", ScmTool::GitLab).build();

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(!result.success);
    assert_eq!(result.status, ScanStatus::Failed);
    assert!(result.error.unwrap().contains("No adapter registered"));
}

#[tokio::test]
async fn test_repository_resolution_failure_stops_pipeline() {
    let fixture = harness(StubAdapter::empty().failing_repository());
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(!result.success);
    assert_eq!(result.status, ScanStatus::Failed);
    assert_eq!(
        fixture.adapter.commit_call_count(),
        0,
        "no fetch rounds after a failed repository lookup"
    );
}

#[tokio::test]
async fn test_limit_truncates_across_pages() {
    let alice = user("alice", "alice");
    let adapter = StubAdapter::serving(
        vec![
            vec![
                commit("c1", 9, Some(alice.clone())),
                commit("c2", 8, Some(alice.clone())),
                commit("c3", 7, Some(alice.clone())),
            ],
            vec![
                commit("c4", 6, Some(alice.clone())),
                commit("c5", 5, Some(alice.clone())),
                commit("c6", 4, Some(alice)),
            ],
        ],
        Vec::new(),
    );
    let fixture = harness(adapter);
    let request = ScanRequest::builder("https://github.com/acme/widgets", ScmTool::GitHub)
        .limit(4)
        .build();

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(result.success);
    assert_eq!(result.commits_found, 4);
    assert_eq!(fixture.adapter.commit_call_count(), 2);
    assert_eq!(fixture.persistence.commits().unwrap().len(), 4);
}

#[tokio::test]
async fn test_merge_request_author_resolved_without_commits() {
    let dave = user("dave", "Dave Lee");
    let adapter = StubAdapter::serving(
        Vec::new(),
        vec![vec![merge_request(3, Some(dave), &["alice"])]],
    );
    let fixture = harness(adapter);
    let request = github_request("https://github.com/acme/widgets");

    let result = fixture.executor.execute(&request, CancelFlag::new()).await;

    assert!(result.success);
    assert_eq!(result.commits_found, 0);
    assert_eq!(result.merge_requests_found, 1);
    assert_eq!(result.users_found, 2, "dave plus the alice reviewer");

    let users = fixture.persistence.users().unwrap();
    let usernames: Vec<_> = users.iter().filter_map(|u| u.username.clone()).collect();
    assert_eq!(usernames, ["alice", "dave"]);

    let merge_requests = fixture.persistence.merge_requests().unwrap();
    assert_eq!(
        merge_requests[0].author_ref.as_ref().unwrap().username.as_deref(),
        Some("dave")
    );
    assert_eq!(merge_requests[0].reviewer_refs.len(), 1);

    assert_eq!(fixture.persistence.save_commit_calls().unwrap(), 0);
}
