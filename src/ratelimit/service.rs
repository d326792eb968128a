//! Rate Limit Service
//!
//! The pre-fetch gate the fetchers call before every page round. Ordering
//! matters: disabled config, absent token, and unregistered platforms all
//! short-circuit to Ok before any probe happens, and a failed probe is
//! swallowed with a warning so quota visibility problems never block a scan.
//! The only error path is an exceeded threshold whose reset wait is longer
//! than the configured maximum while `fail_on_excessive_cooldown` is set.

use std::sync::Arc;

use super::monitor::RateLimitMonitor;
use super::types::RateLimitConfig;
use crate::core::time::Clock;
use crate::scm::error::{RateLimitError, ScmResult};

pub struct RateLimitService {
    config: RateLimitConfig,
    monitors: Vec<Arc<dyn RateLimitMonitor>>,
    clock: Arc<dyn Clock>,
}

impl RateLimitService {
    pub fn new(
        config: RateLimitConfig,
        monitors: Vec<Arc<dyn RateLimitMonitor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            monitors,
            clock,
        }
    }

    /// Check the platform's quota ahead of a fetch round
    ///
    /// Returns Ok in every situation except an exceeded threshold with an
    /// excessive cooldown while the fail flag is set.
    pub async fn check_rate_limit(
        &self,
        platform: &str,
        token: Option<&str>,
        repository_name: &str,
        base_url: &str,
    ) -> ScmResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let token = match token {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Ok(()),
        };

        let Some(monitor) = self
            .monitors
            .iter()
            .find(|m| m.platform().eq_ignore_ascii_case(platform))
        else {
            return Ok(());
        };

        let status = match monitor.check(token, base_url).await {
            Ok(status) => status,
            Err(e) => {
                // Quota visibility problems never block the scan itself
                log::warn!(
                    "Rate limit probe failed for {} while scanning '{}': {}",
                    platform,
                    repository_name,
                    e
                );
                return Ok(());
            }
        };

        let threshold = if self.config.threshold > 0.0 {
            self.config.threshold
        } else {
            monitor.default_threshold()
        };
        let fraction = status.usage_fraction();
        if fraction < threshold {
            log::trace!(
                "{} rate limit at {:.0}% ({} of {}), below threshold",
                platform,
                fraction * 100.0,
                status.used,
                status.limit
            );
            return Ok(());
        }

        let now = self.clock.now_utc();
        let wait_secs = status.seconds_until_reset(now);
        log::warn!(
            "{} rate limit usage {}/{} ({:.0}%) for '{}' is at or above the {:.0}% threshold; quota resets in {}s",
            platform,
            status.used,
            status.limit,
            fraction * 100.0,
            repository_name,
            threshold * 100.0,
            wait_secs
        );

        if self.config.fail_on_excessive_cooldown && wait_secs > self.config.max_cooldown_secs {
            return Err(RateLimitError {
                platform: platform.to_string(),
                used: status.used,
                limit: status.limit,
                threshold,
                reset_at: status.reset_at,
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FixedClock;
    use crate::ratelimit::types::RateLimitStatus;
    use crate::scm::error::{PlatformApiError, ScmError};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubMonitor {
        platform: &'static str,
        default_threshold: f64,
        status: Option<RateLimitStatus>,
        probes: AtomicUsize,
    }

    impl StubMonitor {
        fn returning(platform: &'static str, status: RateLimitStatus) -> Self {
            Self {
                platform,
                default_threshold: 0.8,
                status: Some(status),
                probes: AtomicUsize::new(0),
            }
        }

        fn failing(platform: &'static str) -> Self {
            Self {
                platform,
                default_threshold: 0.8,
                status: None,
                probes: AtomicUsize::new(0),
            }
        }

        fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateLimitMonitor for StubMonitor {
        fn platform(&self) -> &'static str {
            self.platform
        }

        fn default_threshold(&self) -> f64 {
            self.default_threshold
        }

        async fn check(
            &self,
            _token: &str,
            _base_url: &str,
        ) -> Result<RateLimitStatus, PlatformApiError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match &self.status {
                Some(status) => Ok(status.clone()),
                None => Err(PlatformApiError {
                    platform: self.platform.to_string(),
                    status: 500,
                    message: "probe failed".to_string(),
                }),
            }
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn status(used: u64, limit: u64, reset_in_secs: i64) -> RateLimitStatus {
        RateLimitStatus {
            platform: "github".to_string(),
            limit,
            used,
            remaining: limit.saturating_sub(used),
            reset_at: base_time() + chrono::Duration::seconds(reset_in_secs),
        }
    }

    fn service_with(
        config: RateLimitConfig,
        monitor: Arc<StubMonitor>,
    ) -> RateLimitService {
        RateLimitService::new(
            config,
            vec![monitor],
            Arc::new(FixedClock::at(base_time())),
        )
    }

    #[tokio::test]
    async fn test_disabled_config_skips_probe() {
        let monitor = Arc::new(StubMonitor::returning("github", status(4999, 5000, 60)));
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        let service = service_with(config, monitor.clone());

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_ok());
        assert_eq!(monitor.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_or_absent_token_skips_probe() {
        let monitor = Arc::new(StubMonitor::returning("github", status(4999, 5000, 60)));
        let service = service_with(RateLimitConfig::default(), monitor.clone());

        assert!(service
            .check_rate_limit("github", None, "repo", "https://api.github.com")
            .await
            .is_ok());
        assert!(service
            .check_rate_limit("github", Some("   "), "repo", "https://api.github.com")
            .await
            .is_ok());
        assert_eq!(monitor.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_platform_is_a_noop() {
        let monitor = Arc::new(StubMonitor::returning("github", status(4999, 5000, 60)));
        let service = service_with(RateLimitConfig::default(), monitor.clone());

        let result = service
            .check_rate_limit(
                "bitbucket_cloud",
                Some("token"),
                "repo",
                "https://api.bitbucket.org/2.0",
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(monitor.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_failure_is_swallowed() {
        let monitor = Arc::new(StubMonitor::failing("github"));
        let service = service_with(RateLimitConfig::default(), monitor.clone());

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_ok(), "availability must never block a scan");
        assert_eq!(monitor.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_usage_below_threshold_proceeds() {
        // 3999/5000 = 0.7998, just under the 0.8 threshold
        let monitor = Arc::new(StubMonitor::returning("github", status(3999, 5000, 60)));
        let config = RateLimitConfig {
            threshold: 0.8,
            fail_on_excessive_cooldown: true,
            ..Default::default()
        };
        let service = service_with(config, monitor.clone());

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_ok());
        assert_eq!(monitor.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_usage_at_threshold_without_fail_flag_proceeds() {
        // 4500/5000 = 0.9 against threshold 0.8: exceeded, but advisory only
        let monitor = Arc::new(StubMonitor::returning("github", status(4500, 5000, 7200)));
        let config = RateLimitConfig {
            threshold: 0.8,
            ..Default::default()
        };
        let service = service_with(config, monitor);

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_excessive_cooldown_fails_when_flag_set() {
        let monitor = Arc::new(StubMonitor::returning("github", status(4500, 5000, 7200)));
        let config = RateLimitConfig {
            threshold: 0.8,
            max_cooldown_secs: 1800,
            fail_on_excessive_cooldown: true,
            ..Default::default()
        };
        let service = service_with(config, monitor);

        let err = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await
            .unwrap_err();
        match err {
            ScmError::RateLimit(rate) => {
                assert_eq!(rate.platform, "github");
                assert_eq!(rate.used, 4500);
                assert_eq!(rate.limit, 5000);
                assert!((rate.threshold - 0.8).abs() < f64::EPSILON);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_cooldown_proceeds_even_with_flag() {
        // Reset in 60s, well under the 1800s maximum
        let monitor = Arc::new(StubMonitor::returning("github", status(4500, 5000, 60)));
        let config = RateLimitConfig {
            threshold: 0.8,
            fail_on_excessive_cooldown: true,
            ..Default::default()
        };
        let service = service_with(config, monitor);

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_zero_threshold_uses_monitor_default() {
        // Config threshold 0.0: the monitor's 0.8 default applies, and
        // 4500/5000 exceeds it
        let monitor = Arc::new(StubMonitor::returning("github", status(4500, 5000, 7200)));
        let config = RateLimitConfig {
            threshold: 0.0,
            fail_on_excessive_cooldown: true,
            ..Default::default()
        };
        let service = service_with(config, monitor);

        let result = service
            .check_rate_limit("github", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(matches!(result, Err(ScmError::RateLimit(_))));
    }

    #[tokio::test]
    async fn test_platform_match_is_case_insensitive() {
        let monitor = Arc::new(StubMonitor::returning("github", status(4500, 5000, 7200)));
        let config = RateLimitConfig {
            threshold: 0.8,
            fail_on_excessive_cooldown: true,
            ..Default::default()
        };
        let service = service_with(config, monitor.clone());

        let result = service
            .check_rate_limit("GitHub", Some("token"), "repo", "https://api.github.com")
            .await;
        assert!(result.is_err());
        assert_eq!(monitor.probe_count(), 1);
    }
}
