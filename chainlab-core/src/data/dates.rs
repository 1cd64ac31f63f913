//! Free-form date parsing for provider text.
//!
//! Date-picker labels and last-trade stamps arrive in whatever layout the
//! page renders ("March 21, 2025", "Mar 21st 2025", "2025-03-21",
//! "2025-03-20 3:59PM EDT"). Each parser tries a fixed list of layouts after
//! light cleaning and reports failure instead of guessing.
//!
//! Timestamps come out as naive UTC, the same base as epoch-second values
//! from the JSON API.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparseable date: {0:?}")]
pub struct DateParseError(pub String);

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y%m%d",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A %B %d %Y",
    "%a %b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M%p",
    "%Y-%m-%d %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];

/// Zone abbreviations pages append to timestamps, with hours east of UTC.
const ZONE_OFFSETS: &[(&str, i32)] = &[
    ("EDT", -4),
    ("EST", -5),
    ("CDT", -5),
    ("CST", -6),
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
];

/// Split a trailing zone abbreviation off `text`.
fn split_zone(text: &str) -> (&str, Option<FixedOffset>) {
    ZONE_OFFSETS
        .iter()
        .find_map(|(zone, hours)| {
            text.strip_suffix(*zone)
                .map(|body| (body.trim_end(), FixedOffset::east_opt(hours * 3600)))
        })
        .unwrap_or((text, None))
}

/// Collapse whitespace, drop commas/periods and ordinal suffixes ("21st" → "21").
fn clean(text: &str) -> String {
    text.replace([',', '.'], " ")
        .split_whitespace()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(token: &str) -> &str {
    let lower = token.to_ascii_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if lower.ends_with(suffix) {
            let head = &token[..token.len() - suffix.len()];
            if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                return head;
            }
        }
    }
    token
}

/// Parse arbitrary text into a calendar date.
pub fn parse_date(text: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = text.trim();
    // ISO strings first, before cleaning strips their punctuation.
    for fmt in &DATE_FORMATS[..4] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(date);
        }
    }

    let cleaned = clean(trimmed);
    for fmt in &DATE_FORMATS[4..] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Ok(date);
        }
    }

    // A timestamp is still a date.
    parse_datetime(trimmed)
        .map(|dt| dt.date())
        .map_err(|_| DateParseError(text.to_string()))
}

/// Parse arbitrary text into a naive UTC timestamp. A known zone suffix or an
/// RFC 3339 offset is applied; text without a zone is taken as UTC.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime, DateParseError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    let (body, offset) = split_zone(trimmed);
    let local = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(body, fmt).ok())
        .ok_or_else(|| DateParseError(text.to_string()))?;

    match offset {
        Some(offset) => offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| DateParseError(text.to_string())),
        None => Ok(local),
    }
}

/// Epoch seconds → naive UTC timestamp.
pub fn from_epoch_secs(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.naive_utc())
}
