//! Transactional store abstraction
//!
//! This module provides the trait-based store contract the ledger services
//! run against, allowing Caduceus to work with the in-memory and PostgreSQL
//! backends interchangeably.

pub mod factory;
pub mod traits;

pub use factory::{create_backends, create_counter_store, create_store, Backends};
pub use traits::{BillingTx, InventoryTx, LedgerStore, LedgerTransaction, VisitTx, WorkforceTx};
