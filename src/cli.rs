//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Divinator - multi-method divination wizard
#[derive(Parser)]
#[command(
    name = "dv",
    about = "Interactive multi-method divination readings with an AI companion",
    version,
    after_help = "Logs are written to: ~/.local/share/divinator/logs/divinator.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive reading (the default)
    Run,

    /// List the available divination methods
    Methods,

    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["dv"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["dv", "run"]);
        assert!(matches!(cli.command, Some(Command::Run)));
    }

    #[test]
    fn test_cli_parse_methods() {
        let cli = Cli::parse_from(["dv", "methods"]);
        assert!(matches!(cli.command, Some(Command::Methods)));
    }

    #[test]
    fn test_cli_parse_config_subcommand() {
        let cli = Cli::parse_from(["dv", "config"]);
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["dv", "-c", "/path/to/config.yml", "run"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["dv", "-v", "run"]);
        assert!(cli.verbose);
    }
}
