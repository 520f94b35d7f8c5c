//! PostgreSQL-backed counter store

use super::CounterStore;
use crate::adapters::postgresql::client::{map_pg_error, PostgreSQLClient};
use crate::domain::{CaduceusError, CounterKey, Result};
use async_trait::async_trait;
use std::sync::Arc;

const INCREMENT_SQL: &str = "INSERT INTO counters (namespace, scope, value, updated_at) \
     VALUES ($1, $2, 1, now()) \
     ON CONFLICT (namespace, scope) \
     DO UPDATE SET value = counters.value + 1, updated_at = now() \
     RETURNING value";

/// Counters kept in the `counters` table
///
/// The upsert runs in autocommit mode, outside any ledger transaction, so a
/// rolled-back business operation leaves a gap rather than reusing a number.
pub struct PostgreSQLCounterStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLCounterStore {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CounterStore for PostgreSQLCounterStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        let conn = self.client.get_connection().await?;

        let row = conn
            .query_one(INCREMENT_SQL, &[&key.namespace.as_str(), &key.scope])
            .await
            .map_err(|e| map_pg_error("Counter increment failed", e))?;

        row.try_get("value")
            .map_err(|e| CaduceusError::Database(format!("Failed to read counter value: {e}")))
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}
