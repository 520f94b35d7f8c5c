//! Next-number command implementation
//!
//! Mints one identifier through the configured counter store, with the same
//! fallback rules the ledger services use.

use crate::adapters::database::create_counter_store;
use crate::config::load_config;
use crate::core::numbering::CounterService;
use crate::domain::{CounterKey, CounterNamespace};
use clap::Args;

/// Arguments for the next-number command
#[derive(Args, Debug)]
pub struct NextNumberArgs {
    /// Counter namespace (patient, visit, employee)
    pub namespace: CounterNamespace,

    /// OPD/IPD for patients, DEPT:TYPE for visits, the year for employees
    pub scope: String,
}

impl NextNumberArgs {
    /// Execute the next-number command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let scope = self.scope.trim();
        if scope.is_empty() {
            println!("❌ Counter scope cannot be empty");
            return Ok(2);
        }

        let store = match create_counter_store(&config) {
            Ok(store) => store,
            Err(e) => {
                println!("❌ {e}");
                return Ok(2);
            }
        };
        let counters = CounterService::new(store, config.counter.fallback_enabled);
        let key = CounterKey::new(self.namespace, scope);

        match counters.generate(&key).await {
            Ok(number) => {
                if number.degraded {
                    println!("⚠️  {} (degraded: counter store unavailable)", number.value);
                } else {
                    println!("{}", number.value);
                }
                Ok(0)
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to mint number");
                println!("❌ {e}");
                Ok(5)
            }
        }
    }
}
