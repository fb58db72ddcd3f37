//! Error types for configuration checks and event production.

use chrono::{DateTime, Utc};
use recalc_core::PlatformError;

/// Failures that stop a run before its first event.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The analysis is not in the enabled state.
    #[error("'{path}' is not enabled")]
    AnalysisDisabled { path: String },

    /// The resolved configuration carries blocking diagnostics.
    #[error("'{path}' has {} configuration error(s)", .errors.len())]
    ConfigurationErrors {
        path: String,
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    /// An output writes to an attribute the rule also reads.
    #[error("output '{output}' is also used as an input; recalculation cannot read and overwrite the same attribute")]
    InputOutputOverlap { output: String },

    /// The trigger does not match the event source it was given to.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The trigger kind is not one the engine can drive.
    #[error("Unsupported trigger kind: '{0}'")]
    UnsupportedTriggerKind(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Failures while producing events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The time rule returned an instant that is not after the previous one.
    #[error("time rule did not advance past {previous} (returned {next})")]
    Stalled {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    /// More events than the configured cap.
    #[error("event limit of {limit} reached")]
    LimitExceeded { limit: usize },

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}
