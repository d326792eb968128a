//! Date parsing utilities
//!
//! Provides flexible date parsing supporting ISO 8601 formats and relative
//! dates for the --since/--until/--last-scan-from arguments.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

/// Parse a date string into a UTC timestamp
///
/// Supports:
/// - ISO 8601 dates: "2024-01-15", "2024-01-15T10:30:00Z"
/// - Relative past dates: "yesterday", "1 week ago", "2 months ago"
/// - Relative future dates: "in 2 days", "3 hours from now", "tomorrow"
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>, String> {
    // Try ISO 8601 date first
    if let Ok(timestamp) = parse_iso_date(date_str) {
        return Ok(timestamp);
    }

    // Try relative date
    if let Ok(timestamp) = parse_relative_date(date_str) {
        return Ok(timestamp);
    }

    Err(format!(
        "Invalid date format: '{}'. Expected ISO 8601 (YYYY-MM-DD), past relative (e.g., 'yesterday', '1 week ago'), or future relative (e.g., 'in 2 days', '3 hours from now')",
        date_str
    ))
}

/// Parse an ISO 8601 date string
fn parse_iso_date(date_str: &str) -> Result<DateTime<Utc>, String> {
    // Try full datetime first
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try date with time
    if let Ok(dt) = date_str.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }

    // Try just date (YYYY-MM-DD)
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| "Invalid time".to_string())?;
        let dt = Utc
            .from_local_datetime(&datetime)
            .single()
            .ok_or_else(|| "Ambiguous or invalid local time".to_string())?;
        return Ok(dt);
    }

    Err("Not an ISO date".to_string())
}

/// Parse a relative date string
fn parse_relative_date(date_str: &str) -> Result<DateTime<Utc>, String> {
    let lower = date_str.to_lowercase();
    let now = Local::now();

    // Handle special cases
    match lower.as_str() {
        "now" | "today" => return Ok(Utc::now()),
        "yesterday" => {
            let yesterday = now - Duration::days(1);
            return Ok(yesterday.with_timezone(&Utc));
        }
        "tomorrow" => {
            let tomorrow = now + Duration::days(1);
            return Ok(tomorrow.with_timezone(&Utc));
        }
        _ => {}
    }

    // Parse patterns like "N <unit> ago" or "in N <unit>" or "N <unit> from now"
    let parts: Vec<&str> = lower.split_whitespace().collect();

    // Handle "N unit ago" pattern
    if parts.len() >= 2 && parts.last() == Some(&"ago") {
        let count = parts[0]
            .parse::<i64>()
            .map_err(|_| format!("Invalid number in relative date: '{}'", parts[0]))?;

        let unit = if parts.len() == 3 {
            parts[1]
        } else if parts.len() == 2 {
            // Handle cases like "1week ago" without space
            let combined = parts[0];
            if let Some(idx) = combined.chars().position(|c| c.is_alphabetic()) {
                &combined[idx..]
            } else {
                return Err("Invalid relative date format".to_string());
            }
        } else {
            return Err("Invalid relative date format".to_string());
        };

        let duration = parse_time_unit(unit, count)?;
        let past_time = now - duration;
        return Ok(past_time.with_timezone(&Utc));
    }

    // Handle "in N unit" pattern
    if parts.len() == 3 && parts[0] == "in" {
        let count = parts[1]
            .parse::<i64>()
            .map_err(|_| format!("Invalid number in relative date: '{}'", parts[1]))?;

        let unit = parts[2];
        let duration = parse_time_unit(unit, count)?;
        let future_time = now + duration;
        return Ok(future_time.with_timezone(&Utc));
    }

    // Handle "N unit from now" pattern
    if parts.len() >= 4 && parts[parts.len() - 2..] == ["from", "now"] {
        let count = parts[0]
            .parse::<i64>()
            .map_err(|_| format!("Invalid number in relative date: '{}'", parts[0]))?;

        let unit = parts[1];
        let duration = parse_time_unit(unit, count)?;
        let future_time = now + duration;
        return Ok(future_time.with_timezone(&Utc));
    }

    Err("Not a recognized relative date format".to_string())
}

/// Parse a time unit string and count into a chrono Duration
fn parse_time_unit(unit: &str, count: i64) -> Result<Duration, String> {
    match unit {
        "second" | "seconds" | "sec" | "secs" | "s" => Ok(Duration::seconds(count)),
        "minute" | "minutes" | "min" | "mins" | "m" => Ok(Duration::minutes(count)),
        "hour" | "hours" | "hr" | "hrs" | "h" => Ok(Duration::hours(count)),
        "day" | "days" | "d" => Ok(Duration::days(count)),
        "week" | "weeks" | "w" => Ok(Duration::weeks(count)),
        "month" | "months" => Ok(Duration::days(count * 30)), // Approximate
        "year" | "years" | "y" => Ok(Duration::days(count * 365)), // Approximate
        _ => Err(format!("Unknown time unit: '{}'", unit)),
    }
}
