//! Migrate command implementation
//!
//! Applies `migrations/001_initial_schema.sql` to the configured PostgreSQL
//! database. Every statement is idempotent, so running it twice is harmless.

use crate::adapters::postgresql::PostgreSQLClient;
use crate::config::load_config;
use crate::config::schema::{CounterBackend, StoreBackend};
use clap::Args;
use std::time::Duration;

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Only check connectivity, do not change the schema
    #[arg(long)]
    pub check: bool,
}

impl MigrateArgs {
    /// Execute the migrate command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let uses_postgres = config.database.backend == StoreBackend::PostgreSQL
            || config.counter.backend == CounterBackend::PostgreSQL;
        let Some(pg_config) = config.database.postgresql.clone().filter(|_| uses_postgres) else {
            println!("❌ Nothing to migrate: no backend is set to postgresql");
            return Ok(2);
        };

        let client = PostgreSQLClient::new(
            pg_config,
            Duration::from_millis(config.database.lock_timeout_ms),
        )?;
        println!("🔌 Connecting to {}", client.connection_string_safe());

        if let Err(e) = client.test_connection().await {
            tracing::error!(error = %e, "PostgreSQL is unreachable");
            println!("❌ Failed to connect: {e}");
            return Ok(5);
        }
        if self.check {
            println!("✅ Connection OK");
            return Ok(0);
        }

        match client.run_migrations().await {
            Ok(()) => {
                println!("✅ Schema is up to date");
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "Migration failed");
                println!("❌ Migration failed: {e}");
                Ok(5)
            }
        }
    }
}
