//! Audit trail
//!
//! Two complementary records are kept:
//!
//! - an audit row per published event, inserted inside the business
//!   transaction so it commits or rolls back with the mutation
//! - an optional log line per delivered event, written by a wildcard bus
//!   subscriber under the `caduceus::audit` target

use super::events::{EventBus, Subscription};
use crate::adapters::database::LedgerTransaction;
use crate::domain::{AuditEntry, DomainEvent, Result};

/// Insert the audit row for an event that will be published after commit
pub(crate) async fn record_event(
    tx: &mut dyn LedgerTransaction,
    event: &DomainEvent,
    actor: Option<&str>,
) -> Result<()> {
    let mut entry = AuditEntry::for_event(event)?;
    if let Some(actor) = actor {
        entry = entry.by(actor);
    }
    tx.insert_audit(&entry).await
}

/// Insert an audit row for a mutation that publishes no event
pub(crate) async fn record(
    tx: &mut dyn LedgerTransaction,
    event_type: &str,
    payload: serde_json::Value,
    actor: Option<&str>,
) -> Result<()> {
    let mut entry = AuditEntry::new(event_type, payload);
    if let Some(actor) = actor {
        entry = entry.by(actor);
    }
    tx.insert_audit(&entry).await
}

/// Subscribe a handler that logs every event delivered on this instance
pub fn attach_audit_log(bus: &EventBus) -> Subscription {
    bus.subscribe_all(|envelope| {
        tracing::info!(
            target: "caduceus::audit",
            event = %envelope.kind(),
            envelope_id = %envelope.id,
            origin = %envelope.origin,
            published_at = %envelope.published_at,
            summary = %envelope.event.summary(),
            "Domain event"
        );
        Ok(())
    })
}
