//! Fatal/warning triage for evaluation errors.

use recalc_core::{ErrorKind, EvaluationError, Severity};

/// What the run does after an evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Report and continue with the next event.
    Warning,
    /// Report and stop the run.
    Fatal,
}

/// Domain errors below [`Severity::Error`] are warnings. Domain errors at
/// `Error` and every unexpected error are fatal.
pub fn classify(error: &EvaluationError) -> Verdict {
    match error.kind {
        ErrorKind::Domain(severity) if severity < Severity::Error => Verdict::Warning,
        ErrorKind::Domain(_) | ErrorKind::Unexpected => Verdict::Fatal,
    }
}
