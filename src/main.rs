//! Entry point: parse the CLI, load and validate configuration, open
//! resources in dependency order, and run the selected orchestrator mode.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use hexapod_control::cli::Cli;
use hexapod_control::config::AppConfig;
use hexapod_control::orchestrator::Orchestrator;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::from(1);
    }

    info!(mode = ?cli.mode, "starting hexapod control stack");

    let orchestrator = match Orchestrator::start(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    match orchestrator.run(cli.mode) {
        Ok(true) => {
            info!("stopped by signal");
            ExitCode::from(130)
        }
        Ok(false) => {
            info!("stopped normally");
            ExitCode::from(0)
        }
        Err(e) => {
            error!(error = %e, "run loop exited with error");
            ExitCode::from(1)
        }
    }
}
