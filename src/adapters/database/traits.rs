//! Transactional store traits
//!
//! A [`LedgerStore`] hands out [`LedgerTransaction`]s. Every ledger operation
//! runs inside one transaction: it takes the row/key locks it needs, reads,
//! writes, appends an audit row and commits. Dropping a transaction without
//! calling [`LedgerTransaction::commit`] rolls it back.
//!
//! `lock_*` methods block until the lock is granted (or the backend's lock
//! timeout elapses) and hold it until the transaction ends. Plain reads take
//! no locks. Reads within a transaction observe that transaction's own writes.

use crate::domain::billing::{InsuranceClaim, Invoice, InvoiceStatus, Payment};
use crate::domain::ids::{
    ClaimId, DepartmentCode, EmployeeId, InvoiceId, ItemId, PatientId, VisitId,
};
use crate::domain::inventory::{Department, InventoryItem, StockMovement};
use crate::domain::visit::{QueueEntry, Visit, VisitStatus};
use crate::domain::workforce::{Attendance, Employee, Payroll};
use crate::domain::{AuditEntry, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Entry point to a transactional store
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>>;

    /// Test the store connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Short backend name for logs ("memory", "postgresql")
    fn backend_name(&self) -> &'static str;
}

/// Departments and inventory items
#[async_trait]
pub trait InventoryTx: Send {
    async fn department(&mut self, code: &DepartmentCode) -> Result<Option<Department>>;

    /// Insert or rename a department
    async fn upsert_department(&mut self, department: &Department) -> Result<()>;

    async fn item(&mut self, id: ItemId) -> Result<Option<InventoryItem>>;

    /// Read an item and hold its row lock until the transaction ends
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<InventoryItem>>;

    /// Lock the `(name, batch, department)` slot and return the item occupying it
    ///
    /// The slot stays locked even when it is empty, so a concurrent transfer
    /// cannot create a second item for the same slot.
    async fn lock_item_slot(
        &mut self,
        name: &str,
        batch: Option<&str>,
        department: &DepartmentCode,
    ) -> Result<Option<InventoryItem>>;

    async fn insert_item(&mut self, item: &InventoryItem) -> Result<()>;

    async fn update_item_quantity(
        &mut self,
        id: ItemId,
        quantity: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()>;

    /// Movements for an item, oldest first
    async fn movements(&mut self, item: ItemId) -> Result<Vec<StockMovement>>;

    /// `SUM(delta)` over an item's movements
    async fn sum_movement_deltas(&mut self, item: ItemId) -> Result<Decimal>;
}

/// Invoices, payments and insurance claims
#[async_trait]
pub trait BillingTx: Send {
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()>;

    async fn invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>>;

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>>;

    async fn update_invoice_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    /// `SUM(amount)` over an invoice's payments
    async fn sum_payments(&mut self, invoice: InvoiceId) -> Result<Decimal>;

    async fn payments(&mut self, invoice: InvoiceId) -> Result<Vec<Payment>>;

    async fn insert_claim(&mut self, claim: &InsuranceClaim) -> Result<()>;

    async fn lock_claim(&mut self, id: ClaimId) -> Result<Option<InsuranceClaim>>;

    async fn update_claim(&mut self, claim: &InsuranceClaim) -> Result<()>;
}

/// Visits and department queues
#[async_trait]
pub trait VisitTx: Send {
    /// Serialize visit creation for one patient in one department
    async fn lock_visit_scope(&mut self, patient: &PatientId, department: &DepartmentCode)
        -> Result<()>;

    /// The patient's non-completed visit in the department, if any
    async fn open_visit(
        &mut self,
        patient: &PatientId,
        department: &DepartmentCode,
    ) -> Result<Option<Visit>>;

    async fn insert_visit(&mut self, visit: &Visit) -> Result<()>;

    async fn visit(&mut self, id: VisitId) -> Result<Option<Visit>>;

    async fn lock_visit(&mut self, id: VisitId) -> Result<Option<Visit>>;

    async fn update_visit_status(
        &mut self,
        id: VisitId,
        status: VisitStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append a visit to the back of its department queue
    ///
    /// The store assigns the tie-breaking sequence.
    async fn enqueue(
        &mut self,
        visit: VisitId,
        department: &DepartmentCode,
        enqueued_at: DateTime<Utc>,
    ) -> Result<QueueEntry>;

    /// Lock and return the front of a department queue
    async fn lock_queue_head(&mut self, department: &DepartmentCode) -> Result<Option<QueueEntry>>;

    /// Remove a visit's queue entry; a missing entry is not an error
    async fn remove_queue_entry(&mut self, visit: VisitId) -> Result<()>;

    /// Waiting entries in FIFO order
    async fn queue(&mut self, department: &DepartmentCode) -> Result<Vec<QueueEntry>>;
}

/// Employees, attendance and payroll
#[async_trait]
pub trait WorkforceTx: Send {
    async fn insert_employee(&mut self, employee: &Employee) -> Result<()>;

    async fn lock_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>>;

    /// Most recent attendance without a check-out
    async fn open_attendance(&mut self, employee: EmployeeId) -> Result<Option<Attendance>>;

    async fn attendance_on(
        &mut self,
        employee: EmployeeId,
        shift_date: NaiveDate,
    ) -> Result<Vec<Attendance>>;

    async fn insert_attendance(&mut self, attendance: &Attendance) -> Result<()>;

    async fn update_attendance(&mut self, attendance: &Attendance) -> Result<()>;

    /// `SUM(overtime_seconds)` for shift dates in `[from, to]`
    async fn sum_overtime_seconds(
        &mut self,
        employee: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64>;

    async fn payroll_exists(&mut self, employee: EmployeeId, period_start: NaiveDate)
        -> Result<bool>;

    async fn insert_payroll(&mut self, payroll: &Payroll) -> Result<()>;
}

/// A store transaction
#[async_trait]
pub trait LedgerTransaction: InventoryTx + BillingTx + VisitTx + WorkforceTx + Send {
    /// Append an audit row
    async fn insert_audit(&mut self, entry: &AuditEntry) -> Result<()>;

    /// Make every write visible and release all locks
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write and release all locks
    async fn rollback(self: Box<Self>) -> Result<()>;
}
