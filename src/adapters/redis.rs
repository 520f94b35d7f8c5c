//! Shared Redis connection pool
//!
//! One pool serves both the Redis counter store and the event broadcaster.

use crate::config::{redact_url, RedisConfig};
use crate::domain::{CaduceusError, Result};
use deadpool_redis::redis::RedisError;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use secrecy::ExposeSecret;
use std::time::Duration;

/// Build a Redis pool from configuration
///
/// Connections are opened lazily on first use.
///
/// # Errors
///
/// Returns [`CaduceusError::Configuration`] if the URL is rejected.
pub fn create_pool(config: &RedisConfig) -> Result<Pool> {
    let url = config.url.expose_secret().as_ref().to_string();
    tracing::info!(url = %redact_url(&url), "Creating Redis pool");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(url);
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CaduceusError::Configuration(format!("Failed to create Redis pool: {e}")))
}

/// Translate a Redis command error
///
/// Connectivity problems become [`CaduceusError::Unavailable`]; anything the
/// server actually answered (wrong type, corrupt value) is a
/// [`CaduceusError::Database`] error.
pub(crate) fn map_redis_error(context: &str, err: RedisError) -> CaduceusError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        CaduceusError::Unavailable(format!("{context}: {err}"))
    } else {
        CaduceusError::Database(format!("{context}: {err}"))
    }
}

/// Translate a pool checkout failure
pub(crate) fn map_pool_error(err: deadpool_redis::PoolError) -> CaduceusError {
    CaduceusError::Unavailable(format!("Failed to get Redis connection: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use deadpool_redis::redis::ErrorKind;

    #[test]
    fn test_create_pool_is_lazy() {
        let config = RedisConfig {
            url: secret_string("redis://127.0.0.1:1/0".to_string()),
            pool_size: 2,
            timeout_ms: 50,
        };
        let pool = create_pool(&config).unwrap();
        assert_eq!(pool.status().max_size, 2);
    }

    #[test]
    fn test_map_redis_error() {
        let refused = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(
            map_redis_error("INCR", refused),
            CaduceusError::Unavailable(_)
        ));

        let corrupt = RedisError::from((ErrorKind::TypeError, "value is not an integer"));
        assert!(matches!(
            map_redis_error("INCR", corrupt),
            CaduceusError::Database(_)
        ));
    }
}
