//! [`PeriodicEventSource`]: fixed stepping through a [`TimeRule`].

use chrono::{DateTime, Utc};
use recalc_core::time::epsilon;
use recalc_core::{PlatformError, TimeRange, TimeRule, TriggerKind};
use tracing::debug;

use super::{EventSource, EventStream};
use crate::error::{EventError, RunError};

/// Steps a periodic time rule across the range.
///
/// Starting from `start - ε`, each step asks the rule for the next event
/// window and emits the window's end. Stepping stops at the first end past
/// the range. A rule that fails to advance, or more than `max_events`
/// events, ends the stream with an error.
pub struct PeriodicEventSource<'a> {
    rule: &'a dyn TimeRule,
    max_events: usize,
}

impl<'a> PeriodicEventSource<'a> {
    /// Fails with [`RunError::InvalidConfiguration`] unless the rule is periodic.
    pub fn new(rule: &'a dyn TimeRule, max_events: usize) -> Result<Self, RunError> {
        if rule.kind().parse::<TriggerKind>() != Ok(TriggerKind::Periodic) {
            return Err(RunError::InvalidConfiguration(format!(
                "expected a Periodic time rule, got '{}'",
                rule.kind()
            )));
        }
        Ok(Self { rule, max_events })
    }
}

impl EventSource for PeriodicEventSource<'_> {
    fn events<'s>(&'s self, range: &TimeRange) -> Result<EventStream<'s>, EventError> {
        let last = range.start().checked_sub_signed(epsilon()).ok_or_else(|| {
            PlatformError::InvalidTime(format!(
                "cannot step a periodic rule from before {}",
                range.start()
            ))
        })?;
        Ok(Box::new(PeriodicEvents {
            rule: self.rule,
            last,
            end: range.end(),
            produced: 0,
            max_events: self.max_events,
            done: false,
        }))
    }
}

struct PeriodicEvents<'a> {
    rule: &'a dyn TimeRule,
    last: DateTime<Utc>,
    end: DateTime<Utc>,
    produced: usize,
    max_events: usize,
    done: bool,
}

impl PeriodicEvents<'_> {
    fn step(&mut self) -> Option<Result<DateTime<Utc>, EventError>> {
        if self.last >= self.end {
            return None;
        }

        let next = match self.rule.next_event(self.last) {
            Ok(window) => window.end,
            Err(e) => return Some(Err(e.into())),
        };

        if next <= self.last {
            return Some(Err(EventError::Stalled {
                previous: self.last,
                next,
            }));
        }
        if next > self.end {
            debug!(next = %next, end = %self.end, "periodic stepping passed range end");
            return None;
        }
        if self.produced >= self.max_events {
            return Some(Err(EventError::LimitExceeded {
                limit: self.max_events,
            }));
        }

        self.produced += 1;
        self.last = next;
        Some(Ok(next))
    }
}

impl Iterator for PeriodicEvents<'_> {
    type Item = Result<DateTime<Utc>, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.step();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
