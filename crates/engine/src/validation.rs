//! Pre-run checks: operational status, configuration diagnostics, and
//! input/output disjointness.
//!
//! Warnings are reported and do not block the run. Any error-level
//! diagnostic, a disabled analysis, or an output attribute that is also an
//! input stops the run before its first event.

use std::collections::HashSet;

use recalc_core::{Analysis, AnalysisStatus, Configuration, Severity};
use tracing::{debug, error, warn};

use crate::error::RunError;

/// Validate `analysis` and return its resolved configuration.
pub fn validate(analysis: &dyn Analysis) -> Result<Configuration, RunError> {
    let path = analysis.path();

    if analysis.status() != AnalysisStatus::Enabled {
        warn!(analysis = %path, "'{}' is not enabled.", path);
        return Err(RunError::AnalysisDisabled { path });
    }

    let configuration = analysis.configuration()?;
    check_diagnostics(&path, &configuration)?;
    check_disjoint(&configuration)?;
    Ok(configuration)
}

/// Report every diagnostic; fail if any is at error level.
pub fn check_diagnostics(path: &str, configuration: &Configuration) -> Result<(), RunError> {
    if !configuration.has_diagnostics() {
        return Ok(());
    }

    for info in configuration.diagnostics_of(Severity::Information) {
        debug!(analysis = %path, "configuration note: {}", info.message);
    }

    let warnings: Vec<String> = configuration
        .diagnostics_of(Severity::Warning)
        .map(|d| d.message.clone())
        .collect();
    warn!(analysis = %path, "Configuration warnings: {}", warnings.len());
    for message in &warnings {
        warn!("\t{}", message);
    }

    let errors: Vec<String> = configuration
        .diagnostics_of(Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    error!(analysis = %path, "Configuration errors: {}", errors.len());
    for message in &errors {
        error!("\t{}", message);
    }

    Err(RunError::ConfigurationErrors {
        path: path.to_string(),
        errors,
        warnings,
    })
}

/// Fail if any bound output attribute is also an input attribute.
pub fn check_disjoint(configuration: &Configuration) -> Result<(), RunError> {
    let inputs: HashSet<&str> = configuration
        .input_attributes()
        .map(|a| a.id.as_str())
        .collect();

    match configuration
        .output_attributes()
        .find(|a| inputs.contains(a.id.as_str()))
    {
        Some(overlap) => {
            error!(
                output = %overlap.name,
                "the same attribute cannot be used as both input and output ('{}')",
                overlap.name
            );
            Err(RunError::InputOutputOverlap {
                output: overlap.name.clone(),
            })
        }
        None => Ok(()),
    }
}
