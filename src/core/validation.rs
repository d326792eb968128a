//! Validation utilities for scan requests and CLI arguments

use chrono::{DateTime, Utc};

/// Validation failure with a user-actionable message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Validate date range ordering
pub fn validate_date_range(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (since, until) {
        if start > end {
            return Err(ValidationError::new(&format!(
                "Start date '{}' (--since) is after end date '{}' (--until)",
                start, end
            )));
        }
    }
    Ok(())
}

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<usize, ValidationError> {
    match value.parse::<usize>() {
        Ok(0) => Err(ValidationError::new("Value must be greater than 0")),
        Ok(n) => Ok(n),
        Err(_) => Err(ValidationError::new(&format!(
            "'{}' is not a valid positive integer",
            value
        ))),
    }
}

/// Validate that a repository URL is an absolute http(s) URL with a host
pub fn validate_repository_url(url: &str) -> Result<reqwest::Url, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("Repository URL cannot be empty"));
    }

    let parsed = reqwest::Url::parse(trimmed).map_err(|e| {
        ValidationError::new(&format!("Invalid repository URL '{}': {}", trimmed, e))
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::new(&format!(
                "Unsupported URL scheme '{}' in '{}'. Only http and https repositories can be scanned",
                other, trimmed
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::new(&format!(
            "Repository URL '{}' has no host",
            trimmed
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_date_range_ordering() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert!(validate_date_range(Some(early), Some(late)).is_ok());
        assert!(validate_date_range(Some(late), Some(early)).is_err());
        assert!(validate_date_range(None, Some(late)).is_ok());
        assert!(validate_date_range(Some(early), None).is_ok());
        assert!(validate_date_range(None, None).is_ok());
    }

    #[test]
    fn test_validate_positive_int() {
        assert_eq!(validate_positive_int("5"), Ok(5));
        assert!(validate_positive_int("0").is_err());
        assert!(validate_positive_int("-3").is_err());
        assert!(validate_positive_int("abc").is_err());
    }

    #[test]
    fn test_validate_repository_url() {
        assert!(validate_repository_url("https://github.com/acme/widgets").is_ok());
        assert!(
            validate_repository_url("http://bitbucket.internal:7990/projects/AC/repos/widgets")
                .is_ok()
        );

        assert!(validate_repository_url("").is_err());
        assert!(validate_repository_url("   ").is_err());
        assert!(validate_repository_url("git@github.com:acme/widgets.git").is_err());
        assert!(validate_repository_url("ftp://example.com/repo").is_err());
        assert!(validate_repository_url("not a url").is_err());
    }
}
