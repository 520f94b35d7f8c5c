//! In-process event bus
//!
//! The bus is an explicit registry owned by one service instance and shared
//! through `Arc`. Ledger services publish to it only after their transaction
//! has committed.
//!
//! Delivery is synchronous and in registration order. A handler that returns
//! an error or panics is logged and counted as failed; the remaining handlers
//! still run. When an external [`EventChannel`] is configured, every local
//! publish is also broadcast on a spawned task so other instances can deliver
//! it to their handlers.
//!
//! # Example
//!
//! ```rust
//! use caduceus::core::events::EventBus;
//! use caduceus::domain::events::VisitChanged;
//! use caduceus::domain::{DomainEvent, EventKind, VisitId};
//!
//! let bus = EventBus::new("instance-a");
//! let subscription = bus.subscribe(EventKind::VisitCreated, |envelope| {
//!     println!("visit created: {}", envelope.event.summary());
//!     Ok(())
//! });
//!
//! let report = bus.publish(DomainEvent::VisitCreated(VisitChanged {
//!     visit_id: VisitId::new(),
//!     at: chrono::Utc::now(),
//! }));
//! assert_eq!(report.delivered, 1);
//!
//! subscription.unsubscribe();
//! ```

use crate::adapters::events::EventChannel;
use crate::domain::{DomainEvent, EventEnvelope, EventKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Error type handlers may return
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single handler invocation
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&EventEnvelope) -> HandlerResult + Send + Sync>;

/// Outcome of delivering one envelope to local handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handlers that returned `Ok`
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    by_kind: RwLock<HashMap<EventKind, Vec<(u64, Handler)>>>,
    wildcard: RwLock<Vec<(u64, Handler)>>,
}

impl Registry {
    fn remove(&self, id: u64, kind: Option<EventKind>) -> bool {
        match kind {
            Some(kind) => {
                let mut by_kind = self.by_kind.write();
                let Some(handlers) = by_kind.get_mut(&kind) else {
                    return false;
                };
                let before = handlers.len();
                handlers.retain(|(handler_id, _)| *handler_id != id);
                before != handlers.len()
            }
            None => {
                let mut wildcard = self.wildcard.write();
                let before = wildcard.len();
                wildcard.retain(|(handler_id, _)| *handler_id != id);
                before != wildcard.len()
            }
        }
    }

    /// Handlers for a kind followed by wildcard handlers
    fn snapshot(&self, kind: EventKind) -> Vec<Handler> {
        let mut handlers: Vec<Handler> = self
            .by_kind
            .read()
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        handlers.extend(self.wildcard.read().iter().map(|(_, h)| Arc::clone(h)));
        handlers
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping the handle leaves the handler registered; call
/// [`Subscription::unsubscribe`] to stop delivery.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    kind: Option<EventKind>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// The kind this subscription listens to, `None` for wildcard
    pub fn kind(&self) -> Option<EventKind> {
        self.kind
    }

    /// Remove the handler; returns `false` if it was already gone
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.remove(self.id, self.kind))
            .unwrap_or(false)
    }
}

/// Fan-out publish/subscribe registry
pub struct EventBus {
    instance_id: String,
    registry: Arc<Registry>,
    channel: Option<Arc<dyn EventChannel>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("instance_id", &self.instance_id)
            .field("channel", &self.channel.as_ref().map(|c| c.name()))
            .finish()
    }
}

impl EventBus {
    /// Create a bus with local delivery only
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            registry: Arc::new(Registry::default()),
            channel: None,
        }
    }

    /// Create a bus that also broadcasts to an external channel
    pub fn with_channel(instance_id: impl Into<String>, channel: Arc<dyn EventChannel>) -> Self {
        Self {
            channel: Some(channel),
            ..Self::new(instance_id)
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .by_kind
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        tracing::debug!(event = %kind, handler_id = id, "Handler subscribed");
        Subscription {
            id,
            kind: Some(kind),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a handler for every event kind
    ///
    /// Wildcard handlers run after the kind-specific ones.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.wildcard.write().push((id, Arc::new(handler)));

        tracing::debug!(handler_id = id, "Wildcard handler subscribed");
        Subscription {
            id,
            kind: None,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of handlers that would receive an event of this kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry.snapshot(kind).len()
    }

    /// Publish an event raised by this instance
    ///
    /// Never fails: broadcast problems and handler failures are logged and
    /// reflected in the returned report.
    pub fn publish(&self, event: DomainEvent) -> DeliveryReport {
        let envelope = EventEnvelope::new(self.instance_id.clone(), event);
        self.broadcast(&envelope);
        self.deliver_local(&envelope)
    }

    /// Deliver an envelope received from another instance
    ///
    /// Envelopes that originated here are ignored, and remote envelopes are
    /// never broadcast again.
    pub fn deliver_remote(&self, envelope: &EventEnvelope) -> DeliveryReport {
        if envelope.origin == self.instance_id {
            tracing::trace!(envelope_id = %envelope.id, "Ignoring own envelope");
            return DeliveryReport::default();
        }
        self.deliver_local(envelope)
    }

    fn broadcast(&self, envelope: &EventEnvelope) {
        let Some(channel) = self.channel.as_ref() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(
                event = %envelope.kind(),
                "No async runtime, skipping external broadcast"
            );
            return;
        };

        let channel = Arc::clone(channel);
        let envelope = envelope.clone();
        runtime.spawn(async move {
            if let Err(e) = channel.broadcast(&envelope).await {
                tracing::warn!(
                    channel = channel.name(),
                    event = %envelope.kind(),
                    error = %e,
                    "External event broadcast failed"
                );
            }
        });
    }

    fn deliver_local(&self, envelope: &EventEnvelope) -> DeliveryReport {
        let kind = envelope.kind();
        let mut report = DeliveryReport::default();

        for handler in self.registry.snapshot(kind) {
            match catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(event = %kind, error = %e, "Event handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(event = %kind, panic = %message, "Event handler panicked");
                }
            }
        }

        crate::log_event_published!(kind, report.delivered, report.failed);
        report
    }
}
