//! Time ranges, duration strings, and relative time expressions.
//!
//! Time expressions follow the conventions operators already type into
//! historian tools: `*` is now, `t` is today at midnight, `y` is yesterday
//! at midnight, and any base may be followed by signed offsets such as
//! `*-1d` or `t+8h30m`. Absolute timestamps are accepted as RFC 3339 or as
//! naive `YYYY-MM-DD[ HH:MM[:SS]]` (interpreted as UTC).

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};

/// Smallest representable step between two instants.
pub fn epsilon() -> Duration {
    Duration::nanoseconds(1)
}

/// A closed time interval `[start, end]` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(PlatformError::InvalidTime(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `t` falls within the range, both edges included.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs` (seconds).
/// Components can be combined: "2h30m", "1d12h", "90s".
/// Returns `None` if the string is empty or unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: i64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: i64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = match ch {
                'd' => 86_400,
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
            found_unit = true;
        }
    }

    // A trailing number without a unit is seconds, but only on its own.
    if !num_buf.is_empty() {
        if found_unit {
            return None;
        }
        total_secs = num_buf.parse().ok()?;
    }

    Duration::try_seconds(total_secs)
}

/// Parse a time expression relative to `now`.
pub fn parse_time_expr(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(PlatformError::InvalidTime(expr.to_string()));
    }

    if let Some(t) = parse_absolute(expr) {
        return Ok(t);
    }

    let invalid = || PlatformError::InvalidTime(expr.to_string());

    if let Some((base, rest)) = split_relative_base(expr, now) {
        let offset = parse_offsets(rest).ok_or_else(invalid)?;
        return base.checked_add_signed(offset).ok_or_else(invalid);
    }

    // Absolute base followed by offsets, e.g. "2024-03-01-6h".
    for (idx, ch) in expr.char_indices() {
        if idx == 0 || (ch != '+' && ch != '-') {
            continue;
        }
        let (head, tail) = expr.split_at(idx);
        if let (Some(base), Some(offset)) = (parse_absolute(head), parse_offsets(tail)) {
            return base.checked_add_signed(offset).ok_or_else(invalid);
        }
    }

    Err(invalid())
}

fn today(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now)
}

fn split_relative_base(expr: &str, now: DateTime<Utc>) -> Option<(DateTime<Utc>, &str)> {
    let lower = expr.to_ascii_lowercase();
    let words: [(&str, DateTime<Utc>); 6] = [
        ("yesterday", today(now) - Duration::days(1)),
        ("today", today(now)),
        ("now", now),
        ("*", now),
        ("t", today(now)),
        ("y", today(now) - Duration::days(1)),
    ];
    words.into_iter().find_map(|(word, base)| {
        let rest = lower.strip_prefix(word)?;
        if rest.is_empty() || rest.starts_with('+') || rest.starts_with('-') {
            Some((base, &expr[word.len()..]))
        } else {
            None
        }
    })
}

fn parse_absolute(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a run of signed offsets such as `-1d+2h30m`. Empty input is zero.
fn parse_offsets(s: &str) -> Option<Duration> {
    let mut total = Duration::zero();
    let mut rest = s.trim();
    while !rest.is_empty() {
        let negative = match rest.chars().next()? {
            '+' => false,
            '-' => true,
            _ => return None,
        };
        rest = &rest[1..];
        let end = rest.find(['+', '-']).unwrap_or(rest.len());
        let amount = parse_duration(&rest[..end])?;
        total = if negative {
            total.checked_sub(&amount)?
        } else {
            total.checked_add(&amount)?
        };
        rest = &rest[end..];
    }
    Some(total)
}
