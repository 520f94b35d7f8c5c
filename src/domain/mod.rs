//! Domain models and types for Caduceus.
//!
//! This module contains the entities, events and error types shared by the
//! ledger services and the store adapters. Nothing here performs I/O.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ItemId`], [`InvoiceId`], [`DepartmentCode`], ...)
//! - **Ledger entities** ([`InventoryItem`], [`StockMovement`], [`Invoice`], [`Payment`])
//! - **State machines** ([`VisitStatus`], [`InvoiceStatus`], [`ClaimStatus`])
//! - **Domain events** ([`DomainEvent`], [`EventEnvelope`])
//! - **Error types** ([`CaduceusError`], [`Precondition`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Every UUID-keyed entity has its own identifier type:
//!
//! ```rust
//! use caduceus::domain::{ItemId, InvoiceId};
//!
//! let item = ItemId::new();
//! let invoice = InvoiceId::new();
//!
//! // This won't compile - type safety prevents mixing IDs
//! // let wrong: ItemId = invoice;
//! # let _ = (item, invoice);
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CaduceusError>`]. Business
//! rejections carry a [`Precondition`] so callers can match on the reason:
//!
//! ```rust
//! use caduceus::domain::{CaduceusError, Precondition};
//!
//! fn describe(err: &CaduceusError) -> &'static str {
//!     match err.precondition() {
//!         Some(Precondition::InsufficientStock { .. }) => "not enough stock",
//!         Some(_) => "rejected",
//!         None => "failed",
//!     }
//! }
//! # let _ = describe;
//! ```

pub mod audit;
pub mod billing;
pub mod counter;
pub mod errors;
pub mod events;
pub mod ids;
pub mod inventory;
pub mod result;
pub mod visit;
pub mod workforce;

// Re-export commonly used types for convenience
pub use audit::AuditEntry;
pub use billing::{
    ClaimStatus, InsuranceClaim, Invoice, InvoiceItem, InvoiceStatus, NewInvoice, NewInvoiceItem,
    NewPayment, Payment, PaymentMethod, PaymentSummary,
};
pub use counter::{CounterKey, CounterNamespace};
pub use errors::{CaduceusError, Precondition};
pub use events::{DomainEvent, EventEnvelope, EventKind};
pub use ids::{
    AttendanceId, AuditId, ClaimId, DepartmentCode, EmployeeId, InvoiceId, ItemId, MovementId,
    PatientId, PaymentId, PayrollId, VisitId,
};
pub use inventory::{
    Department, InventoryItem, MovementType, NewInventoryItem, StockMovement, StockReconciliation,
};
pub use result::Result;
pub use visit::{NewVisit, QueueEntry, Visit, VisitStatus, VisitType};
pub use workforce::{
    Attendance, AttendanceStatus, Employee, NewEmployee, Payroll, PayrollRequest, ShiftPolicy,
};
