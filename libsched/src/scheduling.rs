//! Scheduling and time parsing utilities
//!
//! This module provides parsing of timestamps stored in the queue and of the
//! human-readable schedule strings accepted by `sched post --schedule`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::ValidationError;

/// Naive formats accepted for stored and user-supplied timestamps, read as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 with an offset, naive date-times (treated as UTC) and bare
/// dates (midnight UTC). Returns `None` for anything else.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a schedule string relative to the current time
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    parse_schedule_at(input, Utc::now())
}

/// Parse a schedule string relative to `now`
///
/// Supports, in order:
/// - Absolute timestamps: "2025-11-20T15:00:00Z", "2025-11-20 15:00"
/// - Relative durations: "2h", "30m", "in 2 hours", "in 3 days"
/// - Natural language: "tomorrow", "next monday 10am"
///
/// # Errors
///
/// Returns `ValidationError::InvalidSchedule` if no format matches.
pub fn parse_schedule_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::InvalidSchedule(
            "schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(at) = parse_timestamp(input) {
        return Ok(at);
    }

    let lowered = input.to_lowercase();
    let relative = lowered.strip_prefix("in ").unwrap_or(&lowered).trim();
    if let Some(duration) = parse_duration(relative) {
        return now.checked_add_signed(duration).ok_or_else(|| {
            ValidationError::InvalidSchedule(format!("{} is too far in the future", input))
        });
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|_| ValidationError::InvalidSchedule(input.to_string()))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    Duration::from_std(std_duration).ok()
}
