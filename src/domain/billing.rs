//! Billing domain model
//!
//! An invoice's status is a projection of its payment history. It is never
//! set directly except for cancellation, which is only possible before any
//! payment has been recorded.

use super::ids::{ClaimId, InvoiceId, PaymentId, PatientId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Invoice settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    /// Derives the status from the paid total
    ///
    /// `Paid` when `paid >= total`, `Partial` when `0 < paid < total`,
    /// otherwise `prior` is kept.
    pub fn derive(paid: Decimal, total: Decimal, prior: Self) -> Self {
        if paid > Decimal::ZERO && paid >= total {
            Self::Paid
        } else if paid > Decimal::ZERO {
            Self::Partial
        } else {
            prior
        }
    }

    /// Whether further payments can be accepted
    pub fn accepts_payments(&self) -> bool {
        matches!(self, Self::Unpaid | Self::Partial)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "UNPAID"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Paid => write!(f, "PAID"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(Self::Unpaid),
            "PARTIAL" => Ok(Self::Partial),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid invoice status: {s}")),
        }
    }
}

/// Billable line on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Requested line before totals are computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewInvoiceItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }
}

/// Input for invoice generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInvoice {
    #[serde(default)]
    pub patient_id: Option<PatientId>,
    pub items: Vec<NewInvoiceItem>,
    #[serde(default)]
    pub insurance_covered_amount: Option<Decimal>,
}

/// A generated invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub patient_id: Option<PatientId>,
    pub items: Vec<InvoiceItem>,
    pub total_amount: Decimal,
    pub insurance_covered_amount: Decimal,
    pub patient_responsible: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a payment was tendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
    Insurance,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Card => write!(f, "card"),
            Self::MobileMoney => write!(f, "mobile_money"),
            Self::BankTransfer => write!(f, "bank_transfer"),
            Self::Insurance => write!(f, "insurance"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "mobile_money" => Ok(Self::MobileMoney),
            "bank_transfer" => Ok(Self::BankTransfer),
            "insurance" => Ok(Self::Insurance),
            _ => Err(format!("Invalid payment method: {s}")),
        }
    }
}

/// Recorded payment, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub provider: Option<String>,
    pub reference: Option<String>,
    pub received_by: String,
    pub received_at: DateTime<Utc>,
}

/// Input for payment recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    pub received_by: String,
}

impl NewPayment {
    pub fn new(
        invoice_id: InvoiceId,
        amount: Decimal,
        method: PaymentMethod,
        received_by: impl Into<String>,
    ) -> Self {
        Self {
            invoice_id,
            amount,
            method,
            provider: None,
            reference: None,
            received_by: received_by.into(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Settlement position of an invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub invoice_id: InvoiceId,
    pub total_amount: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub status: InvoiceStatus,
}

/// Insurance claim lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Submitted,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Approved)
                | (Self::Submitted, Self::Rejected)
                | (Self::Approved, Self::Paid)
        )
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "PAID" => Ok(Self::Paid),
            _ => Err(format!("Invalid claim status: {s}")),
        }
    }
}

/// Insurance claim raised against an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceClaim {
    pub id: ClaimId,
    pub invoice_id: InvoiceId,
    pub provider: String,
    pub claimed_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub payment_id: Option<PaymentId>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 50, InvoiceStatus::Unpaid => InvoiceStatus::Unpaid; "nothing paid keeps prior")]
    #[test_case(20, 50, InvoiceStatus::Unpaid => InvoiceStatus::Partial; "partial")]
    #[test_case(50, 50, InvoiceStatus::Partial => InvoiceStatus::Paid; "exact")]
    #[test_case(60, 50, InvoiceStatus::Partial => InvoiceStatus::Paid; "at or above total")]
    fn test_status_derivation(paid: i64, total: i64, prior: InvoiceStatus) -> InvoiceStatus {
        InvoiceStatus::derive(Decimal::from(paid), Decimal::from(total), prior)
    }

    #[test]
    fn test_accepts_payments() {
        assert!(InvoiceStatus::Unpaid.accepts_payments());
        assert!(InvoiceStatus::Partial.accepts_payments());
        assert!(!InvoiceStatus::Paid.accepts_payments());
        assert!(!InvoiceStatus::Cancelled.accepts_payments());
    }

    #[test]
    fn test_claim_transitions() {
        assert!(ClaimStatus::Submitted.can_transition_to(ClaimStatus::Approved));
        assert!(ClaimStatus::Approved.can_transition_to(ClaimStatus::Paid));
        assert!(!ClaimStatus::Submitted.can_transition_to(ClaimStatus::Paid));
        assert!(!ClaimStatus::Rejected.can_transition_to(ClaimStatus::Approved));
    }

    #[test]
    fn test_payment_method_serde() {
        let json = serde_json::to_string(&PaymentMethod::MobileMoney).unwrap();
        assert_eq!(json, "\"mobile_money\"");
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
    }
}
