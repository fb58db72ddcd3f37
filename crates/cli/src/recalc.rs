//! The `run-analysis` flow after argument parsing: lookup, time parsing,
//! the run itself, and the resulting exit status.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use recalc_core::config::RunConfig;
use recalc_core::time::parse_time_expr;
use recalc_core::{AnalysisLookup, TimeRange};
use recalc_engine::memory::MemoryPlatform;
use recalc_engine::EvaluationOrchestrator;

use crate::cli::CliArgs;
use crate::report;

/// How a command-line invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The run completed and its write call succeeded.
    Succeeded,
    /// The element or analysis does not exist; nothing ran.
    NotFound,
    /// The run aborted or its write call failed.
    Failed,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Succeeded => ExitCode::SUCCESS,
            Status::NotFound | Status::Failed => ExitCode::FAILURE,
        }
    }
}

/// Recalculate the analysis named by `args` on `platform`.
///
/// Unparsable times and configuration-stage failures are returned as
/// errors before any event is evaluated.
pub fn recalculate(
    args: &CliArgs,
    platform: &MemoryPlatform,
    options: &RunConfig,
    now: DateTime<Utc>,
) -> Result<Status> {
    if !platform.has_element(&args.element_path) {
        error!("Failed to find element '{}'", args.element_path);
        return Ok(Status::NotFound);
    }
    let analysis = match platform.find_analysis(&args.element_path, &args.analysis_name) {
        Ok(analysis) => analysis,
        Err(_) => {
            error!(
                "Failed to find analysis '{}|{}'",
                args.element_path, args.analysis_name
            );
            return Ok(Status::NotFound);
        }
    };

    let start = parse_time_expr(&args.start, now)
        .with_context(|| format!("Invalid start time '{}'", args.start))?;
    let end = parse_time_expr(&args.end, now)
        .with_context(|| format!("Invalid end time '{}'", args.end))?;
    let range = TimeRange::new(start, end)?;

    info!(
        "Evaluating {}|{} from {} to {}...",
        args.element_path, args.analysis_name, start, end
    );
    let orchestrator = EvaluationOrchestrator::new(analysis, platform.store(), platform.store())
        .with_options(options.clone());
    let report = orchestrator.run(&range)?;

    for line in report::summary(&report) {
        println!("{line}");
    }
    if let Some(path) = &args.export {
        report::export(path, &platform.store().written())?;
        info!(path = %path.display(), "exported published values");
    }

    Ok(if report::succeeded(&report) {
        Status::Succeeded
    } else {
        Status::Failed
    })
}
