//! Run summary output and value export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use recalc_core::TimeSeriesValue;
use recalc_engine::{RunOutcome, RunReport};

/// Human-readable summary lines for a finished run.
pub fn summary(report: &RunReport) -> Vec<String> {
    let mut lines = vec![
        format!("Recalculation of {} {}.", report.analysis, report.outcome),
        format!(
            "  events: {} attempted, {} succeeded, {} with warnings",
            report.events_attempted, report.evaluations_succeeded, report.warnings
        ),
        format!(
            "  values: {} submitted, {} written, {} rejected ({} ms)",
            report.flush.submitted, report.flush.written, report.flush.item_errors, report.flush.elapsed_ms
        ),
    ];
    if report.flush.destination_errors > 0 {
        lines.push(format!(
            "  destinations with errors: {}",
            report.flush.destination_errors
        ));
    }
    if report.flush.unsupported > 0 {
        lines.push(format!(
            "  skipped unsupported outputs: {}",
            report.flush.unsupported
        ));
    }
    if let Some(failure) = &report.flush.failure {
        lines.push(format!("  write failed: {failure}"));
    }
    lines
}

/// Whether the run should exit successfully.
pub fn succeeded(report: &RunReport) -> bool {
    matches!(report.outcome, RunOutcome::Completed) && report.flush.failure.is_none()
}

/// Write `values` as pretty-printed JSON.
pub fn export(path: &Path, values: &[TimeSeriesValue]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, values)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
