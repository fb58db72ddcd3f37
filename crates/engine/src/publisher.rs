//! Output accumulation and the batched write.
//!
//! [`OutputPublisher`] collects bound time-series outputs across many
//! evaluations and writes them in a single call on [`flush`](OutputPublisher::flush).
//! The batch is emptied on every flush whatever the outcome, so a failed
//! flush is never resubmitted. Values that failed only because of a
//! transient fault are lost and must be recalculated by another run.

use std::time::Instant;

use recalc_core::{
    Configuration, EvaluationState, OutputValue, ResolvedOutput, TimeSeriesValue, UpdateMode,
    ValueWriter,
};
use tracing::{debug, error, info, warn};

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Values handed to the write call.
    pub submitted: usize,
    /// Write-path failures (per destination).
    pub destination_errors: usize,
    /// Per-value failures.
    pub item_errors: usize,
    /// Values that were actually written.
    pub written: usize,
    /// Outputs skipped because their kind cannot be published.
    pub unsupported: usize,
    /// Set when the write call itself failed.
    pub failure: Option<String>,
    pub elapsed_ms: u64,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failure.is_none() && self.destination_errors == 0 && self.item_errors == 0
    }
}

/// Accumulates publishable outputs and writes them in one batch.
pub struct OutputPublisher<'a> {
    writer: &'a dyn ValueWriter,
    outputs: Vec<ResolvedOutput>,
    mode: UpdateMode,
    batch: Vec<TimeSeriesValue>,
    unsupported: usize,
}

impl<'a> OutputPublisher<'a> {
    pub fn new(writer: &'a dyn ValueWriter, configuration: &Configuration, mode: UpdateMode) -> Self {
        Self {
            writer,
            outputs: configuration.outputs.clone(),
            mode,
            batch: Vec::new(),
            unsupported: 0,
        }
    }

    /// Add the publishable outputs of one successful evaluation.
    ///
    /// Only time-series values whose output slot is bound to an attribute
    /// are kept. Event-frame outputs are counted as unsupported.
    pub fn accumulate(&mut self, state: &EvaluationState) {
        for (slot, value) in self.outputs.iter().zip(state.outputs()) {
            match value {
                None => {}
                Some(OutputValue::TimeSeries(v)) => match &slot.attribute {
                    Some(attribute) => self.batch.push(v.clone().bound_to(attribute.clone())),
                    None => debug!(output = %slot.name, "output is not mapped; value not published"),
                },
                Some(OutputValue::EventFrame(frame)) => {
                    self.unsupported += 1;
                    warn!(
                        output = %slot.name,
                        frame = %frame.name,
                        "event frame outputs are not supported; skipped"
                    );
                }
            }
        }
    }

    /// Values waiting for the next flush.
    pub fn pending(&self) -> &[TimeSeriesValue] {
        &self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Write everything accumulated so far in one call and empty the batch.
    pub fn flush(&mut self) -> FlushReport {
        let started = Instant::now();
        let batch = std::mem::take(&mut self.batch);
        let mut report = FlushReport {
            submitted: batch.len(),
            unsupported: std::mem::take(&mut self.unsupported),
            ..FlushReport::default()
        };

        match self.writer.update_values(&batch, self.mode) {
            Err(e) => {
                error!(error = %e, "Failed to publish outputs using bulk call");
                report.failure = Some(e.to_string());
            }
            Ok(errors) => {
                for dest in &errors.destinations {
                    error!(
                        tier = %dest.tier,
                        destination = %dest.destination,
                        "Error while writing outputs to {} {}. {}",
                        dest.tier,
                        dest.destination,
                        dest.message
                    );
                }
                if !errors.items.is_empty() {
                    warn!("{} errors when publishing output results", errors.items.len());
                    for item in &errors.items {
                        let attribute = item
                            .value
                            .attribute
                            .as_ref()
                            .map(|a| a.name.as_str())
                            .unwrap_or("(unmapped)");
                        warn!("\t{} @ {}: {}", attribute, item.value.timestamp, item.message);
                    }
                }
                report.destination_errors = errors.destinations.len();
                report.item_errors = errors.items.len();
                report.written = report.submitted.saturating_sub(report.item_errors);
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            written = report.written,
            submitted = report.submitted,
            "Published {} values. ({} ms)",
            report.written,
            report.elapsed_ms
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use recalc_core::{
        AttributeRef, DestinationTier, EventFrameOutput, InputRef, TimeRange, Value,
    };

    use crate::memory::MemoryStore;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn make_configuration() -> Configuration {
        Configuration {
            inputs: vec![InputRef::Attribute(AttributeRef::new("in", "In"))],
            outputs: vec![
                ResolvedOutput {
                    name: "Avg".into(),
                    attribute: Some(AttributeRef::new("out-avg", "Avg")),
                },
                ResolvedOutput {
                    name: "Max".into(),
                    attribute: Some(AttributeRef::new("out-max", "Max")),
                },
                ResolvedOutput {
                    name: "Scratch".into(),
                    attribute: None,
                },
            ],
            diagnostics: Vec::new(),
        }
    }

    fn make_state(config: &Configuration, t: DateTime<Utc>, v: f64) -> EvaluationState {
        let mut state = EvaluationState::new(config);
        state.set_execution_time(t);
        for i in 0..config.outputs.len() {
            state.set_output(i, OutputValue::TimeSeries(TimeSeriesValue::new(t, Value::Float(v))));
        }
        state
    }

    fn range_all() -> TimeRange {
        TimeRange::new(at("2000-01-01T00:00:00Z"), at("2100-01-01T00:00:00Z")).unwrap()
    }

    // -- accumulate -------------------------------------------------------

    #[test]
    fn accumulates_only_bound_time_series() {
        let store = MemoryStore::new();
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);

        publisher.accumulate(&make_state(&config, at("2024-01-01T10:00:00Z"), 1.0));
        publisher.accumulate(&make_state(&config, at("2024-01-01T11:00:00Z"), 2.0));

        assert_eq!(publisher.len(), 4);
        let ids: Vec<_> = publisher
            .pending()
            .iter()
            .map(|v| v.attribute.as_ref().unwrap().id.as_str())
            .collect();
        assert_eq!(ids, vec!["out-avg", "out-max", "out-avg", "out-max"]);
    }

    #[test]
    fn event_frames_are_counted_as_unsupported() {
        let store = MemoryStore::new();
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);

        let t = at("2024-01-01T10:00:00Z");
        let mut state = EvaluationState::new(&config);
        state.set_output(
            0,
            OutputValue::EventFrame(EventFrameOutput {
                name: "Excursion".into(),
                start: t,
                end: None,
            }),
        );
        publisher.accumulate(&state);

        assert!(publisher.is_empty());
        let report = publisher.flush();
        assert_eq!(report.unsupported, 1);
        assert_eq!(report.submitted, 0);
    }

    // -- flush ------------------------------------------------------------

    #[test]
    fn flush_writes_and_clears() {
        let store = MemoryStore::new();
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);
        publisher.accumulate(&make_state(&config, at("2024-01-01T10:00:00Z"), 5.0));

        let report = publisher.flush();
        assert!(report.is_clean());
        assert_eq!(report.submitted, 2);
        assert_eq!(report.written, 2);
        assert!(publisher.is_empty());
        assert_eq!(store.values("out-avg", &range_all()).len(), 1);

        // A second flush submits nothing new.
        let again = publisher.flush();
        assert_eq!(again.submitted, 0);
        assert_eq!(store.write_calls(), 2);
    }

    #[test]
    fn flush_on_empty_batch_still_calls_writer() {
        let store = MemoryStore::new();
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);
        let report = publisher.flush();
        assert_eq!(report.submitted, 0);
        assert_eq!(report.written, 0);
        assert_eq!(store.write_calls(), 1);
    }

    #[test]
    fn item_errors_reduce_written_count() {
        let store = MemoryStore::new();
        store.reject_attribute("out-max", "point is read-only");
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);
        publisher.accumulate(&make_state(&config, at("2024-01-01T10:00:00Z"), 1.0));
        publisher.accumulate(&make_state(&config, at("2024-01-01T11:00:00Z"), 2.0));

        let report = publisher.flush();
        assert_eq!(report.submitted, 4);
        assert_eq!(report.item_errors, 2);
        assert_eq!(report.written, 2);
        assert!(publisher.is_empty());
    }

    #[test]
    fn destination_errors_are_counted_separately() {
        let store = MemoryStore::new();
        store.reject_destination(DestinationTier::DataArchive, "archive01", "license expired");
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);
        publisher.accumulate(&make_state(&config, at("2024-01-01T10:00:00Z"), 1.0));

        let report = publisher.flush();
        assert_eq!(report.destination_errors, 1);
        assert_eq!(report.item_errors, 0);
        assert_eq!(report.written, 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn total_failure_still_clears_batch() {
        let store = MemoryStore::new();
        store.set_offline("connection refused");
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Replace);
        publisher.accumulate(&make_state(&config, at("2024-01-01T10:00:00Z"), 1.0));

        let report = publisher.flush();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.written, 0);
        assert!(report.failure.as_deref().unwrap().contains("connection refused"));
        assert!(publisher.is_empty());

        // Coming back online does not resurrect the failed values.
        store.clear_faults();
        let report = publisher.flush();
        assert_eq!(report.submitted, 0);
        assert!(store.values("out-avg", &range_all()).is_empty());
    }

    #[test]
    fn insert_mode_fails_existing_timestamps() {
        let store = MemoryStore::new();
        let t = at("2024-01-01T10:00:00Z");
        store.insert("out-avg", t, Value::Float(0.0));
        let config = make_configuration();
        let mut publisher = OutputPublisher::new(&store, &config, UpdateMode::Insert);
        publisher.accumulate(&make_state(&config, t, 9.0));

        let report = publisher.flush();
        assert_eq!(report.item_errors, 1);
        assert_eq!(report.written, 1);
        assert_eq!(store.values("out-avg", &range_all())[0].value, Value::Float(0.0));
    }
}
