//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Caduceus using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Caduceus - hospital ledger operations
#[derive(Parser, Debug)]
#[command(name = "caduceus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "caduceus.toml", env = "CADUCEUS_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CADUCEUS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Apply the PostgreSQL schema
    Migrate(commands::migrate::MigrateArgs),

    /// Mint one identifier with the configured counter store
    NextNumber(commands::next_number::NextNumberArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CounterNamespace;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["caduceus", "validate-config"]);
        assert_eq!(cli.config, "caduceus.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "caduceus",
            "--config",
            "ward.toml",
            "--log-level",
            "debug",
            "migrate",
        ]);
        assert_eq!(cli.config, "ward.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Migrate(_)));
    }

    #[test]
    fn test_cli_parse_next_number() {
        let cli = Cli::parse_from(["caduceus", "next-number", "visit", "ER:EMR"]);
        match cli.command {
            Commands::NextNumber(args) => {
                assert_eq!(args.namespace, CounterNamespace::Visit);
                assert_eq!(args.scope, "ER:EMR");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_namespace() {
        assert!(Cli::try_parse_from(["caduceus", "next-number", "invoice", "X"]).is_err());
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["caduceus", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(ref args) if args.force));
    }
}
