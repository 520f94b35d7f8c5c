//! Atomic increment stores backing the counter service
//!
//! Every implementation increments with a single atomic primitive, so two
//! concurrent callers for the same key never observe the same value:
//!
//! - [`MemoryCounterStore`] - per-key increment under a map shard lock
//! - [`RedisCounterStore`] - `INCR caduceus:counter:{namespace}:{scope}`
//! - [`PostgreSQLCounterStore`] - single-statement upsert with `RETURNING`

pub mod memory;
pub mod postgresql;
pub mod redis;

pub use memory::MemoryCounterStore;
pub use postgresql::PostgreSQLCounterStore;
pub use redis::RedisCounterStore;

use crate::domain::{CounterKey, Result};
use async_trait::async_trait;

/// Store that hands out monotonically increasing integers per key
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` and return the new value
    ///
    /// Counters are created implicitly; the first call for a key returns 1.
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::Unavailable`](crate::domain::CaduceusError::Unavailable)
    /// when the store cannot be reached, and
    /// [`CaduceusError::Database`](crate::domain::CaduceusError::Database)
    /// for any other store failure.
    async fn increment(&self, key: &CounterKey) -> Result<i64>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
