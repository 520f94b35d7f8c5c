//! Domain error types
//!
//! This module defines the error hierarchy for Caduceus. Business rejections
//! (`NotFound`, `InvalidInput`, `PreconditionFailed`) are detected before or
//! during a transaction and abort it with no partial writes. Infrastructure
//! errors never expose third-party types.

use thiserror::Error;

/// Main Caduceus error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum CaduceusError {
    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "inventory item")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed or out-of-range input (quantity <= 0, bad identifiers)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A business precondition does not hold
    #[error("Precondition failed: {0}")]
    PreconditionFailed(#[from] Precondition),

    /// A backing service (counter store, event channel) is unreachable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Store errors that are not business rejections
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Business preconditions whose violation rejects an operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Precondition {
    /// Remove/transfer would drive stock below zero
    #[error("insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        available: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    /// Payment would push the paid total above the invoice total
    #[error("overpayment on invoice {invoice_id}: paid {paid}, attempted {attempted}, total {total}")]
    Overpayment {
        invoice_id: String,
        paid: rust_decimal::Decimal,
        attempted: rust_decimal::Decimal,
        total: rust_decimal::Decimal,
    },

    /// Patient already has a non-completed visit in the department
    #[error("patient {patient_id} already has an open visit {visit_number} in {department}")]
    DuplicateActiveVisit {
        patient_id: String,
        department: String,
        visit_number: String,
    },

    /// State machine transition not allowed
    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Insurance claim must be approved before it can be settled
    #[error("claim {claim_id} is {status}, not approved")]
    ClaimNotApproved { claim_id: String, status: String },

    /// Invoice has payments or is already closed
    #[error("invoice {invoice_id} cannot be cancelled in status {status}")]
    InvoiceNotCancellable { invoice_id: String, status: String },

    /// Payments against a cancelled invoice
    #[error("invoice {0} is cancelled")]
    InvoiceCancelled(String),

    /// Open attendance already exists for this shift date
    #[error("employee {employee_id} already checked in on {shift_date}")]
    AlreadyCheckedIn {
        employee_id: String,
        shift_date: chrono::NaiveDate,
    },

    /// Check-out without a matching check-in
    #[error("employee {0} has no open attendance")]
    NotCheckedIn(String),

    /// Payroll for this employee and period start exists
    #[error("payroll already processed for employee {employee_id} starting {period_start}")]
    PayrollAlreadyProcessed {
        employee_id: String,
        period_start: chrono::NaiveDate,
    },
}

impl CaduceusError {
    /// Shorthand for a [`CaduceusError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP-equivalent status code for surrounding request layers
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidInput(_) => 400,
            Self::PreconditionFailed(p) => match p {
                Precondition::InsufficientStock { .. } | Precondition::Overpayment { .. } => 400,
                _ => 409,
            },
            Self::Unavailable(_) => 503,
            Self::Configuration(_)
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Io(_) => 500,
        }
    }

    /// Whether this error is a business rejection rather than an infrastructure failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidInput(_) | Self::PreconditionFailed(_)
        )
    }

    /// The violated precondition, if any
    pub fn precondition(&self) -> Option<&Precondition> {
        match self {
            Self::PreconditionFailed(p) => Some(p),
            _ => None,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CaduceusError {
    fn from(err: std::io::Error) -> Self {
        CaduceusError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CaduceusError {
    fn from(err: serde_json::Error) -> Self {
        CaduceusError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CaduceusError {
    fn from(err: toml::de::Error) -> Self {
        CaduceusError::Configuration(format!("TOML parse error: {err}"))
    }
}
