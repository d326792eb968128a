//! Reference resolution between records and persisted identities
//!
//! Stamps the repository name on every commit and merge request and wires
//! the `*_ref` fields to persisted users. Records never reach persistence
//! without a repository name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::scan::persistence::PersistenceService;
use crate::scan::request::ScanRequest;
use crate::scm::error::ScmResult;
use crate::scm::types::{Commit, MergeRequest, User};

pub struct DataReferenceUpdater {
    persistence: Arc<dyn PersistenceService>,
}

impl DataReferenceUpdater {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// Resolve commit references against the persisted user map
    ///
    /// The author resolves by the candidate's username, falling back to
    /// the raw author name; the committer by the committer name. A missing
    /// map entry leaves the reference `None`.
    pub fn update_commits(
        &self,
        commits: &mut [Commit],
        user_map: &HashMap<String, User>,
        repository_name: &str,
    ) {
        for commit in commits.iter_mut() {
            commit.repository_name = repository_name.to_string();
            let author_key = commit
                .author
                .as_ref()
                .and_then(|a| a.username.clone())
                .unwrap_or_else(|| commit.author_name.clone());
            commit.author_ref = user_map.get(&author_key).cloned();
            commit.committer_ref = user_map.get(&commit.committer_name).cloned();
        }
    }

    /// Resolve merge request references, synthesizing authors when needed
    ///
    /// An author who raised merge requests without committing in the
    /// scanned range is absent from the map; such identities are created
    /// through the persistence upsert so authors never dangle. Reviewers
    /// resolve through the map only and unresolved ones are omitted.
    pub async fn update_merge_requests(
        &self,
        merge_requests: &mut [MergeRequest],
        user_map: &mut HashMap<String, User>,
        request: &ScanRequest,
    ) -> ScmResult<()> {
        for mr in merge_requests.iter_mut() {
            mr.repository_name = request.repository_name().to_string();

            if let Some(author) = &mr.author {
                if let Some(username) = author.username.clone() {
                    let resolved = match user_map.get(&username) {
                        Some(existing) => existing.clone(),
                        None => {
                            let created = self
                                .persistence
                                .find_or_create_user(
                                    request.repository_name(),
                                    &username,
                                    author.email.as_deref(),
                                    &author.name,
                                    request.tool_config_id(),
                                )
                                .await?;
                            log::debug!(
                                "Created merge-request-only author '{}' for '{}'",
                                username,
                                request.repository_name()
                            );
                            user_map.insert(username, created.clone());
                            created
                        }
                    };
                    mr.author_ref = Some(resolved);
                }
            }

            mr.reviewer_refs = mr
                .reviewer_names
                .iter()
                .filter_map(|name| user_map.get(name).cloned())
                .collect();
        }
        Ok(())
    }
}
