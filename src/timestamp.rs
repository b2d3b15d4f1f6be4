//! File name safe timestamps.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const STRIPPED_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Current UTC time as RFC3339 with `:` and `-` removed, e.g. `20240305T023000Z`.
pub fn timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
        .replace([':', '-'], "")
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, STRIPPED_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

pub fn backup_file_name(ts: &str) -> String {
    format!("backup_{}.sql", ts)
}
