//! Redis-backed counter store

use super::CounterStore;
use crate::adapters::redis::{map_pool_error, map_redis_error};
use crate::domain::{CounterKey, Result};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;

/// Counters incremented with Redis `INCR`
pub struct RedisCounterStore {
    pool: Pool,
}

impl RedisCounterStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let value: i64 = conn
            .incr(key.storage_key(), 1)
            .await
            .map_err(|e| map_redis_error("INCR failed", e))?;

        tracing::trace!(counter = %key, value, "Counter incremented");
        Ok(value)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
