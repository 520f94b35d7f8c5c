//! Append-only audit records
//!
//! Audit rows are written in the same transaction as the mutation they
//! describe, which makes them the durability boundary for side effects. The
//! event bus itself never persists anything.

use super::events::DomainEvent;
use super::ids::AuditId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub actor: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: AuditId::new(),
            event_type: event_type.into(),
            payload,
            actor: None,
            recorded_at: Utc::now(),
        }
    }

    /// Audit row for the event that will be published once the transaction commits
    pub fn for_event(event: &DomainEvent) -> serde_json::Result<Self> {
        Ok(Self::new(event.name(), event.payload_json()?))
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}
