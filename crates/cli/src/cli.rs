use std::path::PathBuf;

use clap::Parser;

/// Recalculate an analysis over a historical time range.
///
/// Evaluates the analysis once per event in the range and writes its
/// outputs back in a single batch. Times accept absolute timestamps
/// (`2024-01-01T06:00:00Z`, `2024-01-01`) and relative expressions
/// (`*`, `t`, `y`, `*-8h`, `t+6h`).
#[derive(Parser, Debug)]
#[command(name = "run-analysis", version, about)]
pub struct CliArgs {
    /// Element path, e.g. \\server\database\element
    pub element_path: String,

    /// Name of the analysis on the element
    pub analysis_name: String,

    /// Start of the range (inclusive)
    #[arg(allow_hyphen_values = true)]
    pub start: String,

    /// End of the range (inclusive)
    #[arg(allow_hyphen_values = true)]
    pub end: String,

    /// Platform fixture (overrides RECALC_FIXTURE)
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Write the values published by the run to this JSON file
    #[arg(long)]
    pub export: Option<PathBuf>,
}
