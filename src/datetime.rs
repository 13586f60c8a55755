//! Date/time utilities for gator.
//!
//! Timestamps are stored as text. Every stored value goes through
//! [`format_timestamp`], which always emits UTC with microsecond precision, so
//! ordering the text column orders the timestamps chronologically.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the plain SQLite `YYYY-MM-DD HH:MM:SS` format.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Parse a feed item's publication date.
///
/// RSS uses RFC 2822 (`Mon, 02 Jan 2006 15:04:05 -0700`); some feeds emit
/// RFC 3339 instead. Anything else yields `None`.
pub fn parse_pub_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp for terminal output.
pub fn format_display(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M UTC").to_string()
}
