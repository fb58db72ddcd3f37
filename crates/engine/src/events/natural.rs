//! [`NaturalEventSource`]: events at the timestamps of recorded input values.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use recalc_core::{AttributeData, AttributeRef, BoundaryType, TimeRange};
use tracing::debug;

use super::{EventSource, EventStream};
use crate::error::EventError;

/// Derives events from the recorded values of the rule's input attributes.
///
/// Every input is queried with [`BoundaryType::Inside`]; only the
/// timestamps are kept. Values exactly on a range edge are kept or dropped
/// according to [`include_start`](Self::include_start) and
/// [`include_end`](Self::include_end), both on by default. At most
/// [`max_events`](Self::max_events) events are emitted before the stream
/// ends with [`EventError::LimitExceeded`].
pub struct NaturalEventSource<'a> {
    inputs: Vec<AttributeRef>,
    data: &'a dyn AttributeData,
    include_start: bool,
    include_end: bool,
    max_events: usize,
}

impl<'a> NaturalEventSource<'a> {
    pub fn new(inputs: Vec<AttributeRef>, data: &'a dyn AttributeData) -> Self {
        Self {
            inputs,
            data,
            include_start: true,
            include_end: true,
            max_events: usize::MAX,
        }
    }

    pub fn max_events(mut self, limit: usize) -> Self {
        self.max_events = limit;
        self
    }

    pub fn include_start(mut self, include: bool) -> Self {
        self.include_start = include;
        self
    }

    pub fn include_end(mut self, include: bool) -> Self {
        self.include_end = include;
        self
    }

    fn keeps(&self, range: &TimeRange, t: DateTime<Utc>) -> bool {
        if !range.contains(t) {
            return false;
        }
        if t == range.start() && !self.include_start {
            return false;
        }
        if t == range.end() && !self.include_end {
            return false;
        }
        true
    }
}

impl EventSource for NaturalEventSource<'_> {
    fn events<'s>(&'s self, range: &TimeRange) -> Result<EventStream<'s>, EventError> {
        let mut timestamps = BTreeSet::new();
        for input in &self.inputs {
            let values = self
                .data
                .recorded_values(input, range, BoundaryType::Inside)?;
            debug!(input = %input, count = values.len(), "collected trigger timestamps");
            timestamps.extend(values.into_iter().map(|v| v.timestamp));
        }

        let kept: Vec<_> = timestamps
            .into_iter()
            .filter(|t| self.keeps(range, *t))
            .collect();
        let limit = self.max_events;
        let overflow: Option<Result<DateTime<Utc>, EventError>> =
            (kept.len() > limit).then_some(Err(EventError::LimitExceeded { limit }));
        Ok(Box::new(
            kept.into_iter()
                .take(limit)
                .map(Ok::<_, EventError>)
                .chain(overflow),
        ))
    }
}
