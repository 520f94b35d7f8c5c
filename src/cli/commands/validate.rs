//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Caduceus configuration file.

use crate::config::load_config;
use crate::config::schema::{CaduceusConfig, StoreBackend};
use crate::config::redact_url;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as its last step
        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        print_summary(&config);
        Ok(0)
    }
}

fn print_summary(config: &CaduceusConfig) {
    println!("Configuration Summary:");
    println!("  Environment: {}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!("  Store: {}", config.database.backend);
    if config.database.backend == StoreBackend::PostgreSQL {
        if let Some(pg) = &config.database.postgresql {
            println!(
                "  PostgreSQL: {}",
                redact_url(pg.connection_string.expose_secret().as_ref())
            );
            println!("  Max Connections: {}", pg.max_connections);
        }
    }
    println!(
        "  Counters: {} (fallback {})",
        config.counter.backend,
        if config.counter.fallback_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    if let Some(redis) = &config.redis {
        println!("  Redis: {}", redact_url(redis.url.expose_secret().as_ref()));
    }
    println!(
        "  Events: {} on '{}'",
        config.events.external, config.events.channel
    );
    println!(
        "  Low Stock Threshold: {}",
        config.inventory.low_stock_threshold
    );
    println!(
        "  Shift: starts {}, {}h standard, overtime x{}",
        config.workforce.shift_start,
        config.workforce.standard_shift_hours,
        config.workforce.overtime_multiplier
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caduceus.toml");
        fs::write(&path, "[inventory]\nlow_stock_threshold = \"3\"\n").unwrap();

        let code = ValidateArgs {}
            .execute(&path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caduceus.toml");
        fs::write(&path, "[workforce]\nshift_start = \"late\"\n").unwrap();

        let code = ValidateArgs {}
            .execute(&path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let code = ValidateArgs {}
            .execute("/nonexistent/caduceus.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
