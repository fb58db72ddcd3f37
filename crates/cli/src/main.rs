mod cli;
mod recalc;
mod report;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use recalc_core::config::{load_dotenv, LoggingConfig};
use recalc_core::Config;
use recalc_engine::memory::Fixture;

use crate::cli::CliArgs;
use crate::recalc::recalculate;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<ExitCode> {
    load_dotenv();
    let config = Config::from_env();
    init_tracing(&config.logging);

    let args = CliArgs::parse();
    config.log_summary();

    let fixture_path = args.fixture.clone().unwrap_or_else(|| config.platform.fixture.clone());
    let platform = Fixture::load(&fixture_path)
        .and_then(Fixture::into_platform)
        .with_context(|| format!("loading platform fixture {}", fixture_path.display()))?;

    let status = recalculate(&args, &platform, &config.run, Utc::now())?;
    Ok(status.into())
}
