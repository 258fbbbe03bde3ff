use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self},
    prelude::*,
};

/// Crates whose events follow the requested verbosity. Everything else (HTTP client,
/// runtime internals) is capped at WARN.
const OWN_TARGETS: [&str; 2] = ["mesoatlas", "atlas"];

fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn targets(level: LevelFilter) -> Targets {
    OWN_TARGETS
        .iter()
        .fold(Targets::new().with_default(level.min(LevelFilter::WARN)), |t, name| {
            t.with_target(*name, level)
        })
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = level_for(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(targets(level));

    let subscriber = tracing_subscriber::registry().with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(path).map_err(CliError::Io)?;
        // The file always records at least INFO, even when the console is quiet.
        let file_level = level.max(LevelFilter::INFO);
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true)
            .with_filter(targets(file_level));

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}
