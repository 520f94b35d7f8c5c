//! In-process counter store

use super::CounterStore;
use crate::domain::{CounterKey, Result};
use async_trait::async_trait;
use dashmap::DashMap;

/// Counters held in a concurrent map
///
/// Values do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<CounterKey, i64>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without incrementing
    pub fn current(&self, key: &CounterKey) -> Option<i64> {
        self.counters.get(key).map(|value| *value)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        let mut value = self.counters.entry(key.clone()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
