//! Redis pub/sub event channel for multi-instance deployments
//!
//! When a ledger operation commits on one instance, its event is:
//! 1. Published to a Redis channel as a JSON [`EventEnvelope`]
//! 2. Received by every instance subscribed to that channel
//! 3. Delivered to the receiving instance's local handlers only
//!
//! Envelopes carry the publishing instance's id; a listener drops its own
//! envelopes so an event is never handled twice on the instance that raised it.

use super::EventChannel;
use crate::adapters::redis::{map_pool_error, map_redis_error};
use crate::config::{redact_url, SecretString};
use crate::core::events::EventBus;
use crate::domain::{CaduceusError, EventEnvelope, Result};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;
use futures::StreamExt;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Delay between listener reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publishes envelopes with Redis `PUBLISH`
pub struct RedisEventChannel {
    pool: Pool,
    channel: String,
}

impl RedisEventChannel {
    pub fn new(pool: Pool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl EventChannel for RedisEventChannel {
    async fn broadcast(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let message = serde_json::to_string(envelope)?;

        let receivers: i64 = conn
            .publish(&self.channel, &message)
            .await
            .map_err(|e| map_redis_error("PUBLISH failed", e))?;

        debug!(
            event = %envelope.kind(),
            envelope_id = %envelope.id,
            receivers,
            "Published event to Redis"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Subscribes to the Redis channel and feeds remote envelopes to the local bus
///
/// # Example
///
/// ```ignore
/// let listener = Arc::new(RedisEventListener::new(url, channel, bus));
/// tokio::spawn(listener.run());
/// ```
pub struct RedisEventListener {
    url: SecretString,
    channel: String,
    bus: Arc<EventBus>,
}

impl RedisEventListener {
    pub fn new(url: SecretString, channel: impl Into<String>, bus: Arc<EventBus>) -> Self {
        Self {
            url,
            channel: channel.into(),
            bus,
        }
    }

    /// Run the subscription loop until the process exits
    ///
    /// Connection failures are logged and retried after a fixed delay.
    pub async fn run(self: Arc<Self>) {
        info!(channel = %self.channel, "Starting Redis event listener");

        loop {
            match self.subscribe_loop().await {
                Ok(()) => {
                    info!("Redis event listener stopped");
                    break;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        delay_secs = RECONNECT_DELAY.as_secs(),
                        "Redis event listener error, reconnecting"
                    );
                    sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn subscribe_loop(&self) -> std::result::Result<(), RedisEventError> {
        use deadpool_redis::redis::Client;

        let url = self.url.expose_secret().as_ref();

        // Pooled connections cannot SUBSCRIBE, so pub/sub gets its own client.
        let client =
            Client::open(url).map_err(|e| RedisEventError::Connection(e.to_string()))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| RedisEventError::Connection(e.to_string()))?;

        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| RedisEventError::Subscribe(e.to_string()))?;

        info!(
            channel = %self.channel,
            url = %redact_url(url),
            "Subscribed to Redis event channel"
        );

        let mut stream = pubsub.on_message();

        loop {
            let Some(msg) = stream.next().await else {
                warn!("Redis pub/sub stream ended");
                return Err(RedisEventError::StreamEnded);
            };

            let payload: String = msg
                .get_payload()
                .map_err(|e| RedisEventError::Message(e.to_string()))?;

            match serde_json::from_str::<EventEnvelope>(&payload) {
                Ok(envelope) => {
                    debug!(
                        event = %envelope.kind(),
                        origin = %envelope.origin,
                        "Received event from Redis"
                    );
                    self.bus.deliver_remote(&envelope);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize Redis event");
                }
            }
        }
    }
}

/// Errors raised inside the listener loop
#[derive(Debug, thiserror::Error)]
pub enum RedisEventError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis subscribe error: {0}")]
    Subscribe(String),

    #[error("Redis message error: {0}")]
    Message(String),

    #[error("Redis pub/sub stream ended")]
    StreamEnded,
}

impl From<RedisEventError> for CaduceusError {
    fn from(err: RedisEventError) -> Self {
        CaduceusError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::redis::create_pool;
    use crate::config::{secret_string, RedisConfig};
    use crate::domain::events::VisitChanged;
    use crate::domain::{DomainEvent, VisitId};
    use chrono::Utc;

    #[tokio::test]
    async fn test_broadcast_to_unreachable_redis_is_unavailable() {
        let pool = create_pool(&RedisConfig {
            url: secret_string("redis://127.0.0.1:1/0".to_string()),
            pool_size: 1,
            timeout_ms: 200,
        })
        .unwrap();
        let channel = RedisEventChannel::new(pool, "caduceus:events");
        let envelope = EventEnvelope::new(
            "test",
            DomainEvent::VisitCreated(VisitChanged {
                visit_id: VisitId::new(),
                at: Utc::now(),
            }),
        );

        let err = channel.broadcast(&envelope).await.unwrap_err();
        assert!(matches!(err, CaduceusError::Unavailable(_)));
        assert_eq!(channel.channel(), "caduceus:events");
    }

    #[test]
    fn test_listener_error_maps_to_unavailable() {
        let err: CaduceusError = RedisEventError::StreamEnded.into();
        assert!(matches!(err, CaduceusError::Unavailable(_)));
    }
}
