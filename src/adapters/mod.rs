//! External system integrations for Caduceus.
//!
//! This module provides adapters for the stores and brokers the ledger
//! services depend on:
//!
//! - [`database`] - Transactional store contract and backend factory
//! - [`memory`] - In-process transactional store
//! - [`postgresql`] - PostgreSQL transactional store
//! - [`counter`] - Atomic increment stores (memory, Redis, PostgreSQL)
//! - [`events`] - External event channels (Redis pub/sub)
//! - [`redis`] - Shared Redis connection pool
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with the in-memory implementations. Services only ever see
//! `Arc<dyn LedgerStore>`, `Arc<dyn CounterStore>` and `Arc<dyn EventChannel>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus::adapters::database::{create_backends, LedgerStore};
//! use caduceus::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("caduceus.toml")?;
//! let backends = create_backends(&config)?;
//!
//! backends.store.test_connection().await?;
//! println!("Ledger store: {}", backends.store.backend_name());
//! # Ok(())
//! # }
//! ```

pub mod counter;
pub mod database;
pub mod events;
pub mod memory;
pub mod postgresql;
pub mod redis;
