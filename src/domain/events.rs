//! Domain events published after a ledger transaction commits
//!
//! Events are a closed set: each variant carries its own payload type and
//! consumers match exhaustively. On the wire an event is
//! `{"name": "StockUpdated", "payload": {...}}` with camelCase payload fields.

use super::billing::{InvoiceItem, PaymentMethod};
use super::ids::{
    AttendanceId, DepartmentCode, EmployeeId, InvoiceId, ItemId, PatientId, PaymentId, PayrollId,
    VisitId,
};
use super::workforce::AttendanceStatus;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdated {
    pub item_id: ItemId,
    pub department_id: Option<DepartmentCode>,
    pub old_quantity: Decimal,
    pub new_quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLowAlert {
    pub item_id: ItemId,
    pub department_id: Option<DepartmentCode>,
    pub quantity: Decimal,
    pub threshold: Decimal,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceGenerated {
    pub invoice_id: InvoiceId,
    pub patient_id: Option<PatientId>,
    pub total_amount: Decimal,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceived {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub provider: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitChanged {
    pub visit_id: VisitId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCheckedIn {
    pub employee_id: EmployeeId,
    pub attendance_id: AttendanceId,
    pub check_in: DateTime<Utc>,
    pub shift_date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeOvertime {
    pub employee_id: EmployeeId,
    pub attendance_id: AttendanceId,
    pub overtime_seconds: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollProcessed {
    pub payroll_id: PayrollId,
    pub employee_id: EmployeeId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub net_pay: Decimal,
}

/// Every event this core publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum DomainEvent {
    StockUpdated(StockUpdated),
    StockLowAlert(StockLowAlert),
    InvoiceGenerated(InvoiceGenerated),
    PaymentReceived(PaymentReceived),
    VisitCreated(VisitChanged),
    VisitCompleted(VisitChanged),
    EmployeeCheckedIn(EmployeeCheckedIn),
    EmployeeOvertime(EmployeeOvertime),
    PayrollProcessed(PayrollProcessed),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StockUpdated(_) => EventKind::StockUpdated,
            Self::StockLowAlert(_) => EventKind::StockLowAlert,
            Self::InvoiceGenerated(_) => EventKind::InvoiceGenerated,
            Self::PaymentReceived(_) => EventKind::PaymentReceived,
            Self::VisitCreated(_) => EventKind::VisitCreated,
            Self::VisitCompleted(_) => EventKind::VisitCompleted,
            Self::EmployeeCheckedIn(_) => EventKind::EmployeeCheckedIn,
            Self::EmployeeOvertime(_) => EventKind::EmployeeOvertime,
            Self::PayrollProcessed(_) => EventKind::PayrollProcessed,
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Serializes the payload alone (without the name tag)
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        Ok(value
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// One-line description used in log output
    pub fn summary(&self) -> String {
        match self {
            Self::StockUpdated(e) => {
                format!("item {} {} -> {}", e.item_id, e.old_quantity, e.new_quantity)
            }
            Self::StockLowAlert(e) => {
                format!("item {} at {} (threshold {})", e.item_id, e.quantity, e.threshold)
            }
            Self::InvoiceGenerated(e) => format!("invoice {} total {}", e.invoice_id, e.total_amount),
            Self::PaymentReceived(e) => {
                format!("payment {} of {} on invoice {}", e.payment_id, e.amount, e.invoice_id)
            }
            Self::VisitCreated(e) | Self::VisitCompleted(e) => format!("visit {}", e.visit_id),
            Self::EmployeeCheckedIn(e) => format!(
                "employee {} {} on {}",
                e.employee_id, e.status, e.shift_date
            ),
            Self::EmployeeOvertime(e) => {
                format!("employee {} overtime {}s", e.employee_id, e.overtime_seconds)
            }
            Self::PayrollProcessed(e) => {
                format!("payroll {} net {}", e.payroll_id, e.net_pay)
            }
        }
    }
}

/// Event name used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    StockUpdated,
    StockLowAlert,
    InvoiceGenerated,
    PaymentReceived,
    VisitCreated,
    VisitCompleted,
    EmployeeCheckedIn,
    EmployeeOvertime,
    PayrollProcessed,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        Self::StockUpdated,
        Self::StockLowAlert,
        Self::InvoiceGenerated,
        Self::PaymentReceived,
        Self::VisitCreated,
        Self::VisitCompleted,
        Self::EmployeeCheckedIn,
        Self::EmployeeOvertime,
        Self::PayrollProcessed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StockUpdated => "StockUpdated",
            Self::StockLowAlert => "StockLowAlert",
            Self::InvoiceGenerated => "InvoiceGenerated",
            Self::PaymentReceived => "PaymentReceived",
            Self::VisitCreated => "VisitCreated",
            Self::VisitCompleted => "VisitCompleted",
            Self::EmployeeCheckedIn => "EmployeeCheckedIn",
            Self::EmployeeOvertime => "EmployeeOvertime",
            Self::PayrollProcessed => "PayrollProcessed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published event with delivery metadata
///
/// `origin` identifies the publishing process so that a listener on the
/// external channel can skip its own broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    pub origin: String,
    pub published_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(origin: impl Into<String>, event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: origin.into(),
            published_at: Utc::now(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock_updated() -> DomainEvent {
        DomainEvent::StockUpdated(StockUpdated {
            item_id: ItemId::new(),
            department_id: Some(DepartmentCode::new("PHARM").unwrap()),
            old_quantity: Decimal::from(5),
            new_quantity: Decimal::from(15),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_wire_format_is_name_and_camel_case_payload() {
        let json = serde_json::to_value(stock_updated()).unwrap();
        assert_eq!(json["name"], "StockUpdated");
        assert_eq!(json["payload"]["departmentId"], "PHARM");
        assert!(json["payload"].get("oldQuantity").is_some());
        assert!(json["payload"].get("old_quantity").is_none());
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new("node-a", stock_updated());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["origin"], "node-a");
        assert_eq!(json["event"]["name"], "StockUpdated");
        assert!(json.get("publishedAt").is_some());

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_payload_json_strips_tag() {
        let payload = stock_updated().payload_json().unwrap();
        assert!(payload.get("name").is_none());
        assert!(payload.get("itemId").is_some());
    }

    #[test]
    fn test_kind_names_match_serde_tags() {
        let event = DomainEvent::VisitCompleted(VisitChanged {
            visit_id: VisitId::new(),
            at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], event.name());
        assert_eq!(EventKind::ALL.len(), 9);
    }
}
