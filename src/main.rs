//! Divinator - multi-method divination wizard
//!
//! CLI entry point.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use divinator::cli::{Cli, Command};
use divinator::config::Config;
use divinator::methods::ALL_METHODS;
use divinator::repl;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("divinator")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to a log file, not stdout/stderr; the terminal belongs to the wizard
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("divinator.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("Divinator loaded config: model={}", config.llm.model);

    match cli.command {
        Some(Command::Methods) => cmd_methods(),
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Run) | None => cmd_run(&config).await,
    }
}

/// Start an interactive reading
async fn cmd_run(config: &Config) -> Result<()> {
    // Fail before the first prompt, not after the user has typed everything in
    config.validate()?;
    repl::run_wizard(config).await
}

/// List the available divination methods
fn cmd_methods() -> Result<()> {
    println!("Available divination methods:");
    println!();
    for method in ALL_METHODS {
        println!("  {}", method.display_name());
        println!("    {}", method.description());
        println!();
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
