//! Scan command executor
//!
//! Drives one repository scan end to end: validate, resolve the
//! repository, fetch commits and merge requests, process identities,
//! resolve references, persist. The executor never returns `Err`; every
//! outcome, including failure and cancellation, lands in a [`ScanResult`]
//! so concurrent scans cannot abort each other.

use std::sync::Arc;

use crate::core::error_handling::log_error_with_context;
use crate::core::shutdown::CancelFlag;
use crate::core::time::Clock;
use crate::platform::registry::AdapterRegistry;
use crate::ratelimit::service::RateLimitService;
use crate::scan::fetcher::{CommitFetcher, MergeRequestFetcher};
use crate::scan::persistence::PersistenceService;
use crate::scan::request::ScanRequest;
use crate::scan::status::ScanStatus;
use crate::scan::types::{derive_scan_id, ScanResult};
use crate::scm::error::{ScmError, ScmResult};
use crate::users::processor::UserProcessor;
use crate::users::references::DataReferenceUpdater;

struct PipelineCounts {
    commits: usize,
    merge_requests: usize,
    users: usize,
}

pub struct ScanCommandExecutor {
    registry: Arc<AdapterRegistry>,
    rate_limits: Arc<RateLimitService>,
    persistence: Arc<dyn PersistenceService>,
    clock: Arc<dyn Clock>,
}

fn transition(status: &mut ScanStatus, next: ScanStatus, scan_id: &str) {
    if status.can_transition_to(next) {
        log::info!("Scan {}: {} -> {}", scan_id, status, next);
    } else {
        log::warn!("Scan {}: illegal transition {} -> {}", scan_id, status, next);
    }
    *status = next;
}

impl ScanCommandExecutor {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        rate_limits: Arc<RateLimitService>,
        persistence: Arc<dyn PersistenceService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            rate_limits,
            persistence,
            clock,
        }
    }

    /// Run one scan to a terminal state
    pub async fn execute(&self, request: &ScanRequest, cancel: CancelFlag) -> ScanResult {
        let started_at = self.clock.now_utc();
        let scan_id = derive_scan_id(request.repository_url(), started_at.timestamp_millis());
        let mut status = ScanStatus::Pending;

        log::info!(
            "Scan {}: starting '{}' ({})",
            scan_id,
            request.repository_name(),
            request.tool().label()
        );
        transition(&mut status, ScanStatus::InProgress, &scan_id);

        match self.run_pipeline(request, &cancel).await {
            Ok(counts) => {
                let finished_at = self.clock.now_utc();
                transition(&mut status, ScanStatus::Completed, &scan_id);
                log::info!(
                    "Scan {}: completed '{}' with {} commits, {} merge requests, {} users",
                    scan_id,
                    request.repository_name(),
                    counts.commits,
                    counts.merge_requests,
                    counts.users
                );
                ScanResult::success(
                    scan_id,
                    request,
                    started_at,
                    finished_at,
                    counts.commits,
                    counts.merge_requests,
                    counts.users,
                )
            }
            Err(ScmError::Cancelled { repository }) => {
                let finished_at = self.clock.now_utc();
                transition(&mut status, ScanStatus::Cancelled, &scan_id);
                let message = format!("Scan of '{}' was cancelled", repository);
                log::warn!("Scan {}: {}", scan_id, message);
                ScanResult::failure(
                    scan_id,
                    request,
                    started_at,
                    finished_at,
                    ScanStatus::Cancelled,
                    message,
                )
            }
            Err(cause) => {
                let finished_at = self.clock.now_utc();
                let wrapped =
                    cause.into_scan_context(request.repository_name(), request.repository_url());
                log_error_with_context(
                    &wrapped,
                    &format!("Scan of '{}' failed", request.repository_name()),
                );
                transition(&mut status, ScanStatus::Failed, &scan_id);
                ScanResult::failure(
                    scan_id,
                    request,
                    started_at,
                    finished_at,
                    ScanStatus::Failed,
                    wrapped.to_string(),
                )
            }
        }
    }

    /// Sequential scan stages; nothing persists before every stage ahead
    /// of persistence has finished
    async fn run_pipeline(
        &self,
        request: &ScanRequest,
        cancel: &CancelFlag,
    ) -> ScmResult<PipelineCounts> {
        request.validate()?;
        let adapter = self.registry.get(request.tool())?;

        let repository = adapter.fetch_repository(request).await?;
        log::debug!(
            "Resolved repository '{}' (id {}, default branch {:?})",
            repository.name,
            repository.id,
            repository.default_branch
        );

        let commit_fetcher = CommitFetcher::new(self.rate_limits.clone());
        let (mut commits, _) = commit_fetcher
            .fetch_all(adapter.as_ref(), request, cancel)
            .await?;

        let mr_fetcher = MergeRequestFetcher::new(self.rate_limits.clone());
        let (mut merge_requests, _) = mr_fetcher
            .fetch_all(adapter.as_ref(), request, cancel)
            .await?;

        let processor = UserProcessor::new(self.persistence.clone());
        let processed = processor.process(&commits, &merge_requests, request).await?;
        let users = processed.total;
        let mut user_map = processed.by_username;

        let updater = DataReferenceUpdater::new(self.persistence.clone());
        updater.update_commits(&mut commits, &user_map, request.repository_name());
        updater
            .update_merge_requests(&mut merge_requests, &mut user_map, request)
            .await?;

        if !commits.is_empty() {
            self.persistence.save_commits(&commits).await?;
        }
        if !merge_requests.is_empty() {
            self.persistence.save_merge_requests(&merge_requests).await?;
        }

        Ok(PipelineCounts {
            commits: commits.len(),
            merge_requests: merge_requests.len(),
            users,
        })
    }
}
