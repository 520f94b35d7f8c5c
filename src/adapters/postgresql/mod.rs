//! PostgreSQL database integration
//!
//! This module provides the durable ledger store and the connection pool
//! shared with the PostgreSQL counter store.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::{PostgreSQLLedgerStore, PostgreSQLTransaction};
pub use client::{PostgreSQLClient, INITIAL_SCHEMA};
