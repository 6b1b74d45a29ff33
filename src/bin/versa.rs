//! Versa CLI Binary
//!
//! Command-line interface for the Versa version-control engine.

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{error, info};
use versa::cli::{map_error, Cli, RunContext};
use versa::config::ConfigLoader;
use versa::logging::{init_logging, LoggingConfig};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Versa CLI starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.repo.clone(), cli.user.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error opening workspace: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Logging is off unless `--verbose`; then the configured section applies,
/// with `--log-level` on top.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    if !cli.verbose {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let mut config = match load_logging_section(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: {:#}; using default logging", e);
            LoggingConfig::default()
        }
    };
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    config
}

fn load_logging_section(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::load(&cli.workspace).context("failed to load workspace config")?,
    };
    let mut logging = config.logging;
    if logging.file.is_relative() {
        logging.file = cli.workspace.join(&logging.file);
    }
    Ok(logging)
}
