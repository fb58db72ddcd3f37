//! [`EvaluationOrchestrator`]: validates an analysis, drives one evaluation
//! per event, and publishes the results.
//!
//! A run moves through `Validating → Running → (Completed | Aborted)`.
//! Validation failures and unsupported triggers return [`RunError`] before
//! any event is evaluated and without touching the store. Once running,
//! every path ends with exactly one flush, so outputs from events before a
//! fatal error are still written.

use std::fmt;

use chrono::{DateTime, Utc};
use recalc_core::config::RunConfig;
use recalc_core::{Analysis, AttributeData, Configuration, EvaluationState, TimeRange, ValueWriter};
use tracing::{debug, error, info, warn};

use crate::classify::{classify, Verdict};
use crate::error::RunError;
use crate::events::{EventSource, TriggerPolicy};
use crate::publisher::{FlushReport, OutputPublisher};
use crate::validation::validate;

/// How a run that got past validation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every event was evaluated.
    Completed,
    /// The run stopped early. `at` is the event being evaluated, if any.
    Aborted {
        at: Option<DateTime<Utc>>,
        reason: String,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Aborted { at: Some(t), reason } => write!(f, "aborted at {t}: {reason}"),
            RunOutcome::Aborted { at: None, reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub analysis: String,
    pub outcome: RunOutcome,
    /// Events whose evaluation was started.
    pub events_attempted: usize,
    /// Evaluations that finished without error.
    pub evaluations_succeeded: usize,
    /// Evaluations that finished with a non-fatal error.
    pub warnings: usize,
    pub flush: FlushReport,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

#[derive(Default)]
struct Tally {
    attempted: usize,
    succeeded: usize,
    warnings: usize,
}

/// Re-executes one analysis over historical time ranges.
///
/// Holds no per-run state: each [`run`](Self::run) re-validates the analysis
/// and owns a fresh configuration, evaluation state and publisher.
pub struct EvaluationOrchestrator<'a> {
    analysis: &'a dyn Analysis,
    data: &'a dyn AttributeData,
    writer: &'a dyn ValueWriter,
    options: RunConfig,
}

impl<'a> EvaluationOrchestrator<'a> {
    pub fn new(
        analysis: &'a dyn Analysis,
        data: &'a dyn AttributeData,
        writer: &'a dyn ValueWriter,
    ) -> Self {
        Self {
            analysis,
            data,
            writer,
            options: RunConfig::default(),
        }
    }

    pub fn with_options(mut self, options: RunConfig) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RunConfig {
        &self.options
    }

    /// Recalculate the analysis over `range`.
    pub fn run(&self, range: &TimeRange) -> Result<RunReport, RunError> {
        let path = self.analysis.path();
        info!(analysis = %path, range = %range, "starting recalculation");

        let configuration = validate(self.analysis)?;
        let policy = TriggerPolicy::resolve(self.analysis.time_rule(), &configuration)?;
        debug!(analysis = %path, trigger = %policy.kind(), "selected event source");
        let source = policy.into_source(self.data, &self.options)?;

        let mut publisher = OutputPublisher::new(self.writer, &configuration, self.options.update_mode);
        let mut state = EvaluationState::new(&configuration);
        let mut tally = Tally::default();

        let outcome = self.drive(
            source.as_ref(),
            range,
            &configuration,
            &mut state,
            &mut publisher,
            &mut tally,
        );
        let flush = publisher.flush();

        let report = RunReport {
            analysis: path,
            outcome,
            events_attempted: tally.attempted,
            evaluations_succeeded: tally.succeeded,
            warnings: tally.warnings,
            flush,
        };
        info!(
            analysis = %report.analysis,
            outcome = %report.outcome,
            events = report.events_attempted,
            succeeded = report.evaluations_succeeded,
            warnings = report.warnings,
            "recalculation finished"
        );
        Ok(report)
    }

    fn drive(
        &self,
        source: &dyn EventSource,
        range: &TimeRange,
        configuration: &Configuration,
        state: &mut EvaluationState,
        publisher: &mut OutputPublisher<'_>,
        tally: &mut Tally,
    ) -> RunOutcome {
        let events = match source.events(range) {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Failed to determine events");
                return RunOutcome::Aborted {
                    at: None,
                    reason: e.to_string(),
                };
            }
        };

        for event in events {
            let time = match event {
                Ok(time) => time,
                Err(e) => {
                    error!(error = %e, "Event production stopped");
                    return RunOutcome::Aborted {
                        at: None,
                        reason: e.to_string(),
                    };
                }
            };

            tally.attempted += 1;
            info!(event = %time, "Evaluating for {}", time);

            state.reset();
            state.set_execution_time(time);
            self.analysis.populate_inputs(state);
            if state.error().is_none() {
                self.analysis.evaluate(state);
            }

            match state.error() {
                None => {
                    tally.succeeded += 1;
                    publisher.accumulate(state);
                    for (output, value) in configuration.outputs.iter().zip(state.outputs()) {
                        match value {
                            Some(value) => info!("\t{} = {}", output.name, value),
                            None => info!("\t{} = (no value)", output.name),
                        }
                    }
                }
                Some(err) => match classify(err) {
                    Verdict::Warning => {
                        tally.warnings += 1;
                        warn!(event = %time, "Warning: {}", err.message);
                    }
                    Verdict::Fatal => {
                        error!(event = %time, "Fatal error: {}", err.message);
                        return RunOutcome::Aborted {
                            at: Some(time),
                            reason: err.message.clone(),
                        };
                    }
                },
            }
        }

        RunOutcome::Completed
    }
}
