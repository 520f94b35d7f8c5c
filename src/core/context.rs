//! Service wiring
//!
//! [`LedgerContext`] owns one store, one counter service and one event bus,
//! and hands them to every ledger service. Build one per process.

use super::audit::attach_audit_log;
use super::billing::BillingLedger;
use super::events::{EventBus, Subscription};
use super::inventory::StockLedger;
use super::numbering::CounterService;
use super::visits::VisitService;
use super::workforce::WorkforceService;
use crate::adapters::database::{create_backends, Backends, LedgerStore};
use crate::adapters::events::RedisEventListener;
use crate::config::schema::{CaduceusConfig, ExternalChannel};
use crate::domain::{CaduceusError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Every ledger service, sharing one store and one bus
pub struct LedgerContext {
    config: CaduceusConfig,
    pub store: Arc<dyn LedgerStore>,
    pub counters: Arc<CounterService>,
    pub bus: Arc<EventBus>,
    pub stock: StockLedger,
    pub billing: BillingLedger,
    pub visits: VisitService,
    pub workforce: WorkforceService,
    audit_log: Option<Subscription>,
}

impl LedgerContext {
    /// Build every backend named in configuration and wire the services
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::Configuration`] for invalid configuration or
    /// a backend that cannot be created
    pub async fn from_config(config: &CaduceusConfig) -> Result<Self> {
        config.validate().map_err(CaduceusError::Configuration)?;
        let backends = create_backends(config)?;
        Self::from_backends(config, backends)
    }

    /// Wire the services over already-built backends
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::Configuration`] if the shift rules are invalid
    pub fn from_backends(config: &CaduceusConfig, backends: Backends) -> Result<Self> {
        let policy = config
            .workforce
            .shift_policy()
            .map_err(CaduceusError::Configuration)?;

        let instance_id = config.events.resolve_instance_id();
        let bus = Arc::new(match backends.channel {
            Some(channel) => EventBus::with_channel(instance_id, channel),
            None => EventBus::new(instance_id),
        });
        let audit_log = config
            .logging
            .audit_events
            .then(|| attach_audit_log(&bus));

        let counters = Arc::new(CounterService::new(
            backends.counters,
            config.counter.fallback_enabled,
        ));
        let store = backends.store;

        info!(
            store = store.backend_name(),
            counters = counters.backend_name(),
            instance_id = bus.instance_id(),
            audit_log = audit_log.is_some(),
            "Ledger context ready"
        );

        Ok(Self {
            config: config.clone(),
            stock: StockLedger::new(
                Arc::clone(&store),
                Arc::clone(&bus),
                config.inventory.low_stock_threshold,
            ),
            billing: BillingLedger::new(Arc::clone(&store), Arc::clone(&bus)),
            visits: VisitService::new(Arc::clone(&store), Arc::clone(&counters), Arc::clone(&bus)),
            workforce: WorkforceService::new(
                Arc::clone(&store),
                Arc::clone(&counters),
                Arc::clone(&bus),
                policy,
            ),
            store,
            counters,
            bus,
            audit_log,
        })
    }

    pub fn config(&self) -> &CaduceusConfig {
        &self.config
    }

    /// Start re-delivering events published by other instances
    ///
    /// Returns `None` unless the Redis channel is configured with
    /// `listen_remote` enabled.
    pub fn start_remote_listener(&self) -> Option<JoinHandle<()>> {
        if self.config.events.external != ExternalChannel::Redis || !self.config.events.listen_remote
        {
            return None;
        }
        let redis = self.config.redis.as_ref()?;

        let listener = Arc::new(RedisEventListener::new(
            redis.url.clone(),
            self.config.events.channel.clone(),
            Arc::clone(&self.bus),
        ));
        Some(tokio::spawn(listener.run()))
    }

    /// Stop logging delivered events; returns `false` if it was not attached
    pub fn detach_audit_log(&mut self) -> bool {
        self.audit_log
            .take()
            .map(Subscription::unsubscribe)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerContext")
            .field("store", &self.store.backend_name())
            .field("counters", &self.counters)
            .field("bus", &self.bus)
            .finish()
    }
}
