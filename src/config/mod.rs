//! Configuration management for Caduceus.
//!
//! # Overview
//!
//! Caduceus uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CADUCEUS_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation of the selected backends on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use caduceus::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("caduceus.toml")?;
//!
//! println!("Store backend: {}", config.database.backend);
//! println!("Counter backend: {}", config.counter.backend);
//! println!("Low-stock threshold: {}", config.inventory.low_stock_threshold);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`DatabaseConfig`] - Transactional store (memory or PostgreSQL)
//! - [`CounterConfig`] - Sequence store and degraded-mode fallback
//! - [`RedisConfig`] - Shared Redis connection
//! - [`EventsConfig`] - External event channel
//! - [`InventoryConfig`] - Low-stock threshold
//! - [`WorkforceConfig`] - Shift start, grace period and overtime rules
//! - [`LoggingConfig`] - Log files
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [database]
//! backend = "postgresql"
//!
//! [database.postgresql]
//! connection_string = "postgresql://hms:${HMS_DB_PASSWORD}@db:5432/hms"
//!
//! [counter]
//! backend = "redis"
//! fallback_enabled = true
//!
//! [redis]
//! url = "redis://cache:6379/0"
//!
//! [events]
//! external = "redis"
//! channel = "caduceus:events"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, CaduceusConfig, CounterBackend, CounterConfig, DatabaseConfig, Environment,
    EventsConfig, ExternalChannel, InventoryConfig, LoggingConfig, PostgreSQLConfig, RedisConfig,
    StoreBackend, WorkforceConfig,
};
pub use secret::{redact_url, secret_string, SecretString, SecretValue};
