//! In-process ledger store
//!
//! Implements the transactional store contract entirely in memory. It backs
//! the test suite and single-node deployments where durability is not needed.

pub mod store;

pub use store::{MemoryLedgerStore, MemoryTransaction, DEFAULT_LOCK_TIMEOUT};
