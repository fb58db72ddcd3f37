//! Event discovery: turning a time range and a trigger into evaluation instants.
//!
//! Every [`EventSource`] yields timestamps that are strictly increasing,
//! free of duplicates, and within the requested range (both edges
//! included). Two sources exist:
//!
//! - [`PeriodicEventSource`]: steps a [`TimeRule`] from just before the
//!   range start, emitting the end of each event window.
//! - [`NaturalEventSource`]: the sorted union of recorded-value timestamps
//!   across the rule's input attributes.
//!
//! [`TriggerPolicy`] picks the source from the analysis's declared trigger kind.

mod natural;
mod periodic;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use recalc_core::config::RunConfig;
use recalc_core::{AttributeData, AttributeRef, Configuration, TimeRange, TimeRule, TriggerKind};

use crate::error::{EventError, RunError};

pub use self::natural::NaturalEventSource;
pub use self::periodic::PeriodicEventSource;

/// Lazy, single-pass sequence of events. An `Err` item ends the sequence.
pub type EventStream<'a> = Box<dyn Iterator<Item = Result<DateTime<Utc>, EventError>> + 'a>;

/// Produces the evaluation instants for a time range.
pub trait EventSource {
    fn events<'a>(&'a self, range: &TimeRange) -> Result<EventStream<'a>, EventError>;
}

/// Triggering policy resolved from an analysis, fixed for one run.
pub enum TriggerPolicy<'a> {
    Periodic(&'a dyn TimeRule),
    Natural(Vec<AttributeRef>),
}

impl<'a> TriggerPolicy<'a> {
    /// Select the policy from the time rule's declared kind.
    pub fn resolve(rule: &'a dyn TimeRule, configuration: &Configuration) -> Result<Self, RunError> {
        match rule.kind().parse::<TriggerKind>() {
            Ok(TriggerKind::Periodic) => Ok(TriggerPolicy::Periodic(rule)),
            Ok(TriggerKind::Natural) => Ok(TriggerPolicy::Natural(
                configuration.input_attributes().cloned().collect(),
            )),
            Err(_) => Err(RunError::UnsupportedTriggerKind(rule.kind().to_string())),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerPolicy::Periodic(_) => TriggerKind::Periodic,
            TriggerPolicy::Natural(_) => TriggerKind::Natural,
        }
    }

    /// Build the matching event source.
    pub fn into_source(
        self,
        data: &'a dyn AttributeData,
        options: &RunConfig,
    ) -> Result<Box<dyn EventSource + 'a>, RunError> {
        match self {
            TriggerPolicy::Periodic(rule) => Ok(Box::new(PeriodicEventSource::new(
                rule,
                options.max_events,
            )?)),
            TriggerPolicy::Natural(inputs) => Ok(Box::new(
                NaturalEventSource::new(inputs, data)
                    .include_start(options.include_start)
                    .include_end(options.include_end)
                    .max_events(options.max_events),
            )),
        }
    }
}
