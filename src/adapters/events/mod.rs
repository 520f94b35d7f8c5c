//! External event channels
//!
//! The event bus hands every published envelope to an optional
//! [`EventChannel`] so other instances can deliver it to their own local
//! handlers. Broadcast is best effort; a failing channel never fails the
//! operation that produced the event.

pub mod redis;

pub use redis::{RedisEventChannel, RedisEventError, RedisEventListener};

use crate::domain::{EventEnvelope, Result};
use async_trait::async_trait;

/// Outbound broadcast of committed domain events
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Send one envelope to every other instance
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unreachable or the envelope cannot
    /// be serialized. Callers log and drop the error.
    async fn broadcast(&self, envelope: &EventEnvelope) -> Result<()>;

    /// Short channel name for logs
    fn name(&self) -> &'static str;
}
