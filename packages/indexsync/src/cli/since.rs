//! `--since` parsing
//!
//! Accepted forms:
//! - `YYYY-MM-DD-HH:MM`
//! - `YYYY-MM-DD` (midnight)
//! - `[#D][#H][#M][#S]`, case-insensitive, subtracted from now
//!
//! Calendar forms are read as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Result, SyncError};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?P<days>\d+)D)?(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?$")
        .expect("duration pattern is valid")
});

pub fn parse_since(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let text = text.trim();
    let invalid = || SyncError::InvalidSince(text.to_string());
    if text.is_empty() {
        return Err(invalid());
    }

    if let Ok(at) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d-%H:%M") {
        return Ok(at.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return day
            .and_hms_opt(0, 0, 0)
            .map(|at| at.and_utc())
            .ok_or_else(invalid);
    }

    let caps = DURATION_RE.captures(text).ok_or_else(invalid)?;
    let units: [(&str, fn(i64) -> Option<Duration>); 4] = [
        ("days", Duration::try_days),
        ("hours", Duration::try_hours),
        ("minutes", Duration::try_minutes),
        ("seconds", Duration::try_seconds),
    ];

    let mut ago = Duration::zero();
    for (name, unit) in units {
        let Some(m) = caps.name(name) else {
            continue;
        };
        let amount: i64 = m.as_str().parse().map_err(|_| invalid())?;
        let part = unit(amount).ok_or_else(invalid)?;
        ago = ago.checked_add(&part).ok_or_else(invalid)?;
    }

    now.checked_sub_signed(ago).ok_or_else(invalid)
}
