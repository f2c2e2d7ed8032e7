//! Shared utility functions

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
///
/// Always microsecond precision with a `Z` suffix, so the stored text has a
/// fixed width and SQL string comparison orders timestamps chronologically.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required timestamp column.
///
/// `created_at` is always written by [`format_datetime`]; a row with a
/// corrupt value reads back as created now rather than failing the query.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a nullable datetime column.
///
/// Unparseable values are treated as absent.
pub fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
