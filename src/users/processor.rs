//! Candidate identity collection and persistence
//!
//! Pulls every contributor identity out of a scan's commits and merge
//! requests, deduplicates them by the User set identity, and upserts the
//! attributable ones through the persistence boundary. Identities the
//! platform could not attribute to an account (no username) are counted
//! but never stored.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::scan::persistence::PersistenceService;
use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::types::{Commit, MergeRequest, User};

/// Persisted identities keyed by username, plus the distinct candidate
/// count including anonymous ones
pub struct ProcessedUsers {
    pub by_username: HashMap<String, User>,
    pub total: usize,
}

pub struct UserProcessor {
    persistence: Arc<dyn PersistenceService>,
}

impl UserProcessor {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    pub async fn process(
        &self,
        commits: &[Commit],
        merge_requests: &[MergeRequest],
        request: &ScanRequest,
    ) -> ScmResult<ProcessedUsers> {
        let mut candidates: HashSet<User> = HashSet::new();

        for commit in commits {
            if let Some(author) = &commit.author {
                candidates.insert(author.clone());
            }
        }
        for mr in merge_requests {
            if let Some(author) = &mr.author {
                candidates.insert(author.clone());
            }
            // Reviewers arrive as bare usernames; synthesize an identity
            for reviewer in &mr.reviewer_names {
                candidates.insert(User::new(Some(reviewer.clone()), reviewer.clone()));
            }
        }

        let total = candidates.len();
        let mut by_username = HashMap::new();
        for mut candidate in candidates {
            let Some(username) = candidate.username.clone() else {
                continue;
            };
            candidate.repository_name = request.repository_name().to_string();
            candidate.tool_config_id = request.tool_config_id().to_string();
            let persisted = self.persistence.save_user(&candidate).await?;
            by_username.insert(username, persisted);
        }

        log::debug!(
            "Processed {} candidate identities for '{}' ({} persisted)",
            total,
            request.repository_name(),
            by_username.len()
        );

        Ok(ProcessedUsers { by_username, total })
    }
}
