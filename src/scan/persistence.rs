//! Persistence boundary for scan output
//!
//! The executor speaks to storage only through [`PersistenceService`].
//! Two reference implementations live here: an in-process store backing
//! tests and dry runs, and a JSON exporter for the CLI's `--out` mode.
//! Anything heavier belongs behind the same trait in a downstream crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::sync::handle_mutex_poison;
use crate::scm::error::{DataProcessingError, ScmError, ScmResult};
use crate::scm::types::{Commit, MergeRequest, User};

fn lock_error(message: String) -> ScmError {
    ScmError::Configuration { message }
}

fn persistence_error(message: String) -> ScmError {
    ScmError::DataProcessing(DataProcessingError::Persistence { message })
}

/// Storage key for user upserts
type UserKey = (Option<String>, String, String);

fn user_key(user: &User) -> UserKey {
    (
        user.username.clone(),
        user.repository_name.clone(),
        user.tool_config_id.clone(),
    )
}

#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn save_commits(&self, commits: &[Commit]) -> ScmResult<()>;

    async fn save_merge_requests(&self, merge_requests: &[MergeRequest]) -> ScmResult<()>;

    /// Upsert by `(username, repository_name, tool_config_id)`; an
    /// existing record wins and is returned unchanged.
    async fn save_user(&self, user: &User) -> ScmResult<User>;

    /// Resolve an identity that surfaced outside the commit set, creating
    /// it when absent
    async fn find_or_create_user(
        &self,
        repository_name: &str,
        username_or_id: &str,
        email: Option<&str>,
        display_name: &str,
        tool_config_id: &str,
    ) -> ScmResult<User>;
}

#[derive(Default)]
struct MemoryState {
    commits: Vec<Commit>,
    merge_requests: Vec<MergeRequest>,
    users: HashMap<UserKey, User>,
    save_commit_calls: usize,
    save_merge_request_calls: usize,
}

/// In-process store used by tests and dry runs
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<MemoryState>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> ScmResult<Vec<Commit>> {
        let state = handle_mutex_poison(self.state.lock(), lock_error)?;
        Ok(state.commits.clone())
    }

    pub fn merge_requests(&self) -> ScmResult<Vec<MergeRequest>> {
        let state = handle_mutex_poison(self.state.lock(), lock_error)?;
        Ok(state.merge_requests.clone())
    }

    pub fn users(&self) -> ScmResult<Vec<User>> {
        let state = handle_mutex_poison(self.state.lock(), lock_error)?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Number of `save_commits` invocations, empty-skip assertions rely
    /// on this
    pub fn save_commit_calls(&self) -> ScmResult<usize> {
        let state = handle_mutex_poison(self.state.lock(), lock_error)?;
        Ok(state.save_commit_calls)
    }

    pub fn save_merge_request_calls(&self) -> ScmResult<usize> {
        let state = handle_mutex_poison(self.state.lock(), lock_error)?;
        Ok(state.save_merge_request_calls)
    }
}

#[async_trait]
impl PersistenceService for MemoryPersistence {
    async fn save_commits(&self, commits: &[Commit]) -> ScmResult<()> {
        let mut state = handle_mutex_poison(self.state.lock(), lock_error)?;
        state.save_commit_calls += 1;
        state.commits.extend_from_slice(commits);
        Ok(())
    }

    async fn save_merge_requests(&self, merge_requests: &[MergeRequest]) -> ScmResult<()> {
        let mut state = handle_mutex_poison(self.state.lock(), lock_error)?;
        state.save_merge_request_calls += 1;
        state.merge_requests.extend_from_slice(merge_requests);
        Ok(())
    }

    async fn save_user(&self, user: &User) -> ScmResult<User> {
        let mut state = handle_mutex_poison(self.state.lock(), lock_error)?;
        let existing = state
            .users
            .entry(user_key(user))
            .or_insert_with(|| user.clone());
        Ok(existing.clone())
    }

    async fn find_or_create_user(
        &self,
        repository_name: &str,
        username_or_id: &str,
        email: Option<&str>,
        display_name: &str,
        tool_config_id: &str,
    ) -> ScmResult<User> {
        let key: UserKey = (
            Some(username_or_id.to_string()),
            repository_name.to_string(),
            tool_config_id.to_string(),
        );
        let mut state = handle_mutex_poison(self.state.lock(), lock_error)?;
        if let Some(existing) = state.users.get(&key) {
            return Ok(existing.clone());
        }
        let mut user = User::new(
            Some(username_or_id.to_string()),
            display_name.to_string(),
        )
        .with_email(email.map(str::to_string));
        user.repository_name = repository_name.to_string();
        user.tool_config_id = tool_config_id.to_string();
        state.users.insert(key, user.clone());
        Ok(user)
    }
}

/// Writes scan output as pretty JSON under an output directory
///
/// Each save rewrites the whole file from the accumulated records, so
/// concurrent scans of several repositories end up merged in one export.
pub struct JsonExportPersistence {
    out_dir: PathBuf,
    memory: MemoryPersistence,
}

impl JsonExportPersistence {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            memory: MemoryPersistence::new(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    async fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> ScmResult<()> {
        let payload = serde_json::to_string_pretty(value)
            .map_err(|e| persistence_error(format!("Failed to serialise {}: {}", file_name, e)))?;
        tokio::fs::create_dir_all(&self.out_dir).await.map_err(|e| {
            persistence_error(format!(
                "Failed to create output directory '{}': {}",
                self.out_dir.display(),
                e
            ))
        })?;
        let path = self.out_dir.join(file_name);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| persistence_error(format!("Failed to write '{}': {}", path.display(), e)))
    }
}

#[async_trait]
impl PersistenceService for JsonExportPersistence {
    async fn save_commits(&self, commits: &[Commit]) -> ScmResult<()> {
        self.memory.save_commits(commits).await?;
        self.write_json("commits.json", &self.memory.commits()?).await
    }

    async fn save_merge_requests(&self, merge_requests: &[MergeRequest]) -> ScmResult<()> {
        self.memory.save_merge_requests(merge_requests).await?;
        self.write_json("merge_requests.json", &self.memory.merge_requests()?)
            .await
    }

    async fn save_user(&self, user: &User) -> ScmResult<User> {
        let saved = self.memory.save_user(user).await?;
        self.write_json("users.json", &self.memory.users()?).await?;
        Ok(saved)
    }

    async fn find_or_create_user(
        &self,
        repository_name: &str,
        username_or_id: &str,
        email: Option<&str>,
        display_name: &str,
        tool_config_id: &str,
    ) -> ScmResult<User> {
        let created = self
            .memory
            .find_or_create_user(
                repository_name,
                username_or_id,
                email,
                display_name,
                tool_config_id,
            )
            .await?;
        self.write_json("users.json", &self.memory.users()?).await?;
        Ok(created)
    }
}
