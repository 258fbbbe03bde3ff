mod cli;
mod commands;
mod config;
mod data;
mod error;
mod logging;
mod lookup;
mod runner;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 Atlas CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!(
            "Setting Rayon global thread pool to {} threads.",
            num_threads
        );
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e))
            })?;
    }

    let config_args = cli.config;
    let command_result = match cli.command {
        Commands::Classify(args) => {
            info!("Dispatching to 'classify' command.");
            commands::classify::run(args).await
        }
        Commands::Score(args) => {
            info!("Dispatching to 'score' command.");
            commands::score::run(args, &config_args).await
        }
        Commands::Record(args) => {
            info!("Dispatching to 'record' command.");
            commands::record::run(args, &config_args).await
        }
        Commands::Gaps(args) => {
            info!("Dispatching to 'gaps' command.");
            commands::gaps::run(args, &config_args).await
        }
        Commands::Fill(args) => {
            info!("Dispatching to 'fill' command.");
            commands::fill::run(args, &config_args).await
        }
        Commands::Report(args) => {
            info!("Dispatching to 'report' command.");
            commands::report::run(args, &config_args).await
        }
        Commands::Check(args) => {
            info!("Dispatching to 'check' command.");
            commands::check::run(args, &config_args).await
        }
        Commands::Data(args) => {
            info!("Dispatching to 'data' command.");
            commands::data::run(args).await
        }
    };

    match &command_result {
        Ok(_) => info!("✅ Command completed successfully."),
        Err(e) => error!("❌ Command failed: {}", e),
    }
    command_result
}
