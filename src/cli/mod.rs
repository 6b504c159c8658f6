//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for eob-curator using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// eob-curator - FHIR ExplanationOfBenefit flattening ETL
#[derive(Parser, Debug)]
#[command(name = "eob-curator")]
#[command(version, about, long_about = None)]
#[command(author = "eob-curator Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "eob-curator.toml", env = "EOB_CURATOR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "EOB_CURATOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flatten staged EOB resources and load the curated tables
    Run(commands::run::RunArgs),

    /// Count EOBs, items and contained Coverage resources in the source
    Count(commands::count::CountArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::run::TargetArg;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["eob-curator", "run"]);
        assert_eq!(cli.config, "eob-curator.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::parse_from([
            "eob-curator",
            "run",
            "--target",
            "coverage",
            "--dry-run",
            "--batch-size",
            "250",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.target, Some(TargetArg::Coverage));
        assert!(args.dry_run);
        assert_eq!(args.batch_size, Some(250));
    }

    #[test]
    fn test_cli_rejects_unknown_target() {
        assert!(Cli::try_parse_from(["eob-curator", "run", "--target", "claims"]).is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["eob-curator", "--config", "custom.toml", "count"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::Count(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["eob-curator", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["eob-curator", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["eob-curator", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
