//! Time rule implementations: fixed intervals, cron schedules, and the
//! natural (input-driven) marker rule.

use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use cron::Schedule;
use recalc_core::{EventWindow, PlatformError, Result, TimeRule};

/// Periodic rule with windows aligned to `UNIX_EPOCH + offset + k * period`.
#[derive(Debug, Clone)]
pub struct IntervalTimeRule {
    period: Duration,
    offset: Duration,
}

impl IntervalTimeRule {
    pub fn new(period: Duration, offset: Duration) -> Result<Self> {
        if period <= Duration::zero() {
            return Err(PlatformError::InvalidDuration(format!(
                "period must be positive, got {period}"
            )));
        }
        Ok(Self { period, offset })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TimeRule for IntervalTimeRule {
    fn kind(&self) -> &str {
        "Periodic"
    }

    fn next_event(&self, after: DateTime<Utc>) -> Result<EventWindow> {
        let overflow = || PlatformError::Other(format!("time rule overflow stepping from {after}"));

        let period = self.period.num_nanoseconds().ok_or_else(overflow)?;
        let offset = self.offset.num_nanoseconds().ok_or_else(overflow)?;
        let after_ns = after.timestamp_nanos_opt().ok_or_else(overflow)?;

        let relative = after_ns.checked_sub(offset).ok_or_else(overflow)?;
        let mut k = relative.div_euclid(period);
        if relative.rem_euclid(period) != 0 {
            k += 1;
        }
        let start_ns = k
            .checked_mul(period)
            .and_then(|n| n.checked_add(offset))
            .ok_or_else(overflow)?;
        let end_ns = start_ns.checked_add(period).ok_or_else(overflow)?;

        Ok(EventWindow {
            start: Utc.timestamp_nanos(start_ns),
            end: Utc.timestamp_nanos(end_ns),
        })
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Periodic rule whose windows run between consecutive cron ticks.
#[derive(Debug, Clone)]
pub struct CronTimeRule {
    expression: String,
    schedule: Schedule,
}

impl CronTimeRule {
    pub fn new(expression: &str) -> Result<Self> {
        let expression = normalize_cron(expression);
        let schedule = Schedule::from_str(&expression)
            .map_err(|e| PlatformError::Parse(format!("invalid cron expression '{expression}': {e}")))?;
        Ok(Self {
            expression,
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First tick at or after `at`.
    fn tick_at_or_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let before = at.checked_sub_signed(Duration::seconds(1))?;
        let mut tick = self.schedule.after(&before).next()?;
        while tick < at {
            tick = self.schedule.after(&tick).next()?;
        }
        Some(tick)
    }
}

impl TimeRule for CronTimeRule {
    fn kind(&self) -> &str {
        "Periodic"
    }

    fn next_event(&self, after: DateTime<Utc>) -> Result<EventWindow> {
        let exhausted =
            || PlatformError::Other(format!("cron '{}' has no tick after {after}", self.expression));
        let start = self.tick_at_or_after(after).ok_or_else(exhausted)?;
        let end = self.schedule.after(&start).next().ok_or_else(exhausted)?;
        Ok(EventWindow { start, end })
    }
}

/// Marker rule for analyses triggered by input values. It does not step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalTimeRule;

impl TimeRule for NaturalTimeRule {
    fn kind(&self) -> &str {
        "Natural"
    }

    fn next_event(&self, _after: DateTime<Utc>) -> Result<EventWindow> {
        Err(PlatformError::Other(
            "natural time rules are driven by input values and cannot be stepped".to_string(),
        ))
    }
}

/// A rule of a kind this platform only names, such as `"Event"`.
#[derive(Debug, Clone)]
pub struct OpaqueTimeRule {
    kind: String,
}

impl OpaqueTimeRule {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl TimeRule for OpaqueTimeRule {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn next_event(&self, _after: DateTime<Utc>) -> Result<EventWindow> {
        Err(PlatformError::Other(format!(
            "'{}' time rules cannot be stepped",
            self.kind
        )))
    }
}
