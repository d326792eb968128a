//! Rate limit configuration and status types

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::validation::ValidationError;

/// Rate limiting behaviour, from the `[rate-limit]` config table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Usage fraction that triggers the cooldown path. 0.0 means each
    /// monitor's own default applies.
    pub threshold: f64,
    /// Longest reset wait considered acceptable, in seconds
    pub max_cooldown_secs: u64,
    /// When set, a cooldown longer than `max_cooldown_secs` fails the scan
    /// instead of proceeding
    pub fail_on_excessive_cooldown: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.0,
            max_cooldown_secs: 1800,
            fail_on_excessive_cooldown: false,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ValidationError::new(&format!(
                "Rate limit threshold must be between 0.0 and 1.0, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Snapshot of a platform's request quota
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    pub platform: String,
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Fraction of the quota consumed; 0.0 when the platform reports no limit
    pub fn usage_fraction(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used as f64 / self.limit as f64
        }
    }

    /// Seconds until the quota resets, clamped at zero when already past
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_config_defaults() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.threshold, 0.0);
        assert_eq!(config.max_cooldown_secs, 1800);
        assert!(!config.fail_on_excessive_cooldown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = RateLimitConfig::default();
        config.threshold = 1.0;
        assert!(config.validate().is_ok());
        config.threshold = 1.5;
        assert!(config.validate().is_err());
        config.threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_usage_fraction() {
        let status = RateLimitStatus {
            platform: "github".to_string(),
            limit: 5000,
            used: 4500,
            remaining: 500,
            reset_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        };
        assert!((status.usage_fraction() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_fraction_with_zero_limit() {
        let status = RateLimitStatus {
            platform: "gitlab".to_string(),
            limit: 0,
            used: 0,
            remaining: 0,
            reset_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(status.usage_fraction(), 0.0);
    }

    #[test]
    fn test_seconds_until_reset_clamps_at_zero() {
        let reset = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let status = RateLimitStatus {
            platform: "github".to_string(),
            limit: 5000,
            used: 100,
            remaining: 4900,
            reset_at: reset,
        };
        let before = reset - chrono::Duration::seconds(90);
        assert_eq!(status.seconds_until_reset(before), 90);
        let after = reset + chrono::Duration::seconds(10);
        assert_eq!(status.seconds_until_reset(after), 0);
    }
}
