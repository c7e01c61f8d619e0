//! Date helpers for `created_at` decomposition.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 style date or datetime into a calendar date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    parse_basic_date(s)
}

/// ISO-8601 basic form: `YYYYMMDD`, optionally followed by `T` and a
/// compact time such as `HHMMSS`.
fn parse_basic_date(s: &str) -> Option<NaiveDate> {
    let (date, time) = match s.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (s, None),
    };
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(time) = time {
        if time.is_empty() || !time.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return None;
        }
    }
    let year = date[..4].parse().ok()?;
    let month = date[4..6].parse().ok()?;
    let day = date[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Extract a month (1..=12) from a date-like string.
///
/// The `YYYY-MM...` split is tried first; anything else goes through the
/// full date parser.
pub fn parse_month(value: &str) -> Option<u32> {
    let s = value.trim();
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() >= 2 {
        if let Ok(m) = parts[1].trim().parse::<i64>() {
            if (1..=12).contains(&m) {
                return Some(m as u32);
            }
        }
    }
    parse_calendar_date(s).map(|d| d.month())
}

/// Season bucket: 1 winter, 2 summer, 3 monsoon, 4 post-monsoon, 0 unknown.
pub fn season_for_month(month: u32) -> u8 {
    match month {
        12 | 1 | 2 => 1,
        3..=5 => 2,
        6..=8 => 3,
        9..=11 => 4,
        _ => 0,
    }
}
