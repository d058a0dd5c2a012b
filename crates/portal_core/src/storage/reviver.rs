//! JSON parsing with ISO-8601 date revival.
//!
//! Strings shaped like ISO timestamps are normalised to RFC 3339 UTC on load, so values
//! written from any offset deserialize into the same `DateTime<Utc>` in every realm.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;

fn iso_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$").ok()
        })
        .as_ref()
}

/// Returns whether `raw` looks like an ISO-8601 timestamp.
pub fn is_iso_date(raw: &str) -> bool {
    iso_date_pattern().is_some_and(|pattern| pattern.is_match(raw))
}

/// Parses an ISO-8601 timestamp; strings without an offset are read as UTC.
pub fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    if !is_iso_date(raw) {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Rewrites every date-like string in `value` to canonical RFC 3339 UTC.
pub fn revive_dates(value: Value) -> Value {
    match value {
        Value::String(raw) => match parse_iso_date(&raw) {
            Some(date) => Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => Value::String(raw),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(revive_dates).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, revive_dates(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Parses `raw` JSON and revives dates.
///
/// # Errors
///
/// Returns the JSON syntax error when `raw` is malformed.
pub fn parse_with_dates(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str::<Value>(raw).map(revive_dates)
}
