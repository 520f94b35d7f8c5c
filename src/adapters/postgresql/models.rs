//! Row mapping for the PostgreSQL ledger tables
//!
//! Enumerations are stored as TEXT using their `Display` form and parsed back
//! with `FromStr`; money and quantities are NUMERIC columns read as
//! [`Decimal`](rust_decimal::Decimal). Invoice line items are a JSONB array.

use crate::domain::billing::{InsuranceClaim, Invoice, InvoiceItem, Payment};
use crate::domain::ids::{
    AttendanceId, ClaimId, EmployeeId, InvoiceId, ItemId, MovementId, PaymentId, VisitId,
};
use crate::domain::inventory::{Department, InventoryItem, StockMovement};
use crate::domain::visit::{QueueEntry, Visit};
use crate::domain::workforce::{Attendance, Employee};
use crate::domain::{CaduceusError, Result};
use std::str::FromStr;
use tokio_postgres::types::{FromSql, Json};
use tokio_postgres::Row;
use uuid::Uuid;

/// Columns selected for an inventory item, in [`item_from_row`] order
pub const ITEM_COLUMNS: &str = "id, name, sku, batch, expiry, quantity, initial_quantity, \
     department_code, catalog_ref, created_at, updated_at";

pub const MOVEMENT_COLUMNS: &str = "id, item_id, from_department, to_department, delta, \
     movement_type, reason, actor, created_at";

pub const INVOICE_COLUMNS: &str = "id, patient_id, items, total_amount, \
     insurance_covered_amount, patient_responsible, status, created_at, updated_at";

pub const PAYMENT_COLUMNS: &str =
    "id, invoice_id, amount, method, provider, reference, received_by, received_at";

pub const CLAIM_COLUMNS: &str = "id, invoice_id, provider, claimed_amount, approved_amount, \
     status, payment_id, submitted_at, updated_at";

pub const VISIT_COLUMNS: &str = "id, visit_number, patient_id, department_code, visit_type, \
     status, degraded_number, created_at, updated_at";

pub const QUEUE_COLUMNS: &str = "visit_id, department_code, enqueued_at, sequence";

pub const EMPLOYEE_COLUMNS: &str =
    "id, employee_number, name, department_code, hourly_rate, degraded_number, hired_at";

pub const ATTENDANCE_COLUMNS: &str =
    "id, employee_id, shift_date, check_in, check_out, status, overtime_seconds";

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get(name)
        .map_err(|e| CaduceusError::Database(format!("Failed to read column {name}: {e}")))
}

/// Parse a TEXT column through the type's `FromStr`
pub(crate) fn parse_text<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse()
        .map_err(|e| CaduceusError::Database(format!("Corrupt value in column {name}: {e}")))
}

fn text_column<T>(row: &Row, name: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = column(row, name)?;
    parse_text(name, &raw)
}

fn optional_text_column<T>(row: &Row, name: &str) -> Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = column(row, name)?;
    raw.map(|value| parse_text(name, &value)).transpose()
}

pub fn department_from_row(row: &Row) -> Result<Department> {
    Ok(Department {
        code: text_column(row, "code")?,
        name: column(row, "name")?,
    })
}

pub fn item_from_row(row: &Row) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: ItemId::from_uuid(column::<Uuid>(row, "id")?),
        name: column(row, "name")?,
        sku: column(row, "sku")?,
        batch: column(row, "batch")?,
        expiry: column(row, "expiry")?,
        quantity: column(row, "quantity")?,
        initial_quantity: column(row, "initial_quantity")?,
        department: optional_text_column(row, "department_code")?,
        catalog_ref: column(row, "catalog_ref")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn movement_from_row(row: &Row) -> Result<StockMovement> {
    Ok(StockMovement {
        id: MovementId::from_uuid(column::<Uuid>(row, "id")?),
        item_id: ItemId::from_uuid(column::<Uuid>(row, "item_id")?),
        from_department: optional_text_column(row, "from_department")?,
        to_department: optional_text_column(row, "to_department")?,
        delta: column(row, "delta")?,
        movement_type: text_column(row, "movement_type")?,
        reason: column(row, "reason")?,
        actor: column(row, "actor")?,
        created_at: column(row, "created_at")?,
    })
}

pub fn invoice_from_row(row: &Row) -> Result<Invoice> {
    let Json(items): Json<Vec<InvoiceItem>> = column(row, "items")?;
    Ok(Invoice {
        id: InvoiceId::from_uuid(column::<Uuid>(row, "id")?),
        patient_id: optional_text_column(row, "patient_id")?,
        items,
        total_amount: column(row, "total_amount")?,
        insurance_covered_amount: column(row, "insurance_covered_amount")?,
        patient_responsible: column(row, "patient_responsible")?,
        status: text_column(row, "status")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn payment_from_row(row: &Row) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(column::<Uuid>(row, "id")?),
        invoice_id: InvoiceId::from_uuid(column::<Uuid>(row, "invoice_id")?),
        amount: column(row, "amount")?,
        method: text_column(row, "method")?,
        provider: column(row, "provider")?,
        reference: column(row, "reference")?,
        received_by: column(row, "received_by")?,
        received_at: column(row, "received_at")?,
    })
}

pub fn claim_from_row(row: &Row) -> Result<InsuranceClaim> {
    Ok(InsuranceClaim {
        id: ClaimId::from_uuid(column::<Uuid>(row, "id")?),
        invoice_id: InvoiceId::from_uuid(column::<Uuid>(row, "invoice_id")?),
        provider: column(row, "provider")?,
        claimed_amount: column(row, "claimed_amount")?,
        approved_amount: column(row, "approved_amount")?,
        status: text_column(row, "status")?,
        payment_id: column::<Option<Uuid>>(row, "payment_id")?.map(PaymentId::from_uuid),
        submitted_at: column(row, "submitted_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn visit_from_row(row: &Row) -> Result<Visit> {
    Ok(Visit {
        id: VisitId::from_uuid(column::<Uuid>(row, "id")?),
        visit_number: column(row, "visit_number")?,
        patient_id: text_column(row, "patient_id")?,
        department: text_column(row, "department_code")?,
        visit_type: text_column(row, "visit_type")?,
        status: text_column(row, "status")?,
        degraded_number: column(row, "degraded_number")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub fn queue_entry_from_row(row: &Row) -> Result<QueueEntry> {
    Ok(QueueEntry {
        visit_id: VisitId::from_uuid(column::<Uuid>(row, "visit_id")?),
        department: text_column(row, "department_code")?,
        enqueued_at: column(row, "enqueued_at")?,
        sequence: column(row, "sequence")?,
    })
}

pub fn employee_from_row(row: &Row) -> Result<Employee> {
    Ok(Employee {
        id: EmployeeId::from_uuid(column::<Uuid>(row, "id")?),
        employee_number: column(row, "employee_number")?,
        name: column(row, "name")?,
        department: optional_text_column(row, "department_code")?,
        hourly_rate: column(row, "hourly_rate")?,
        degraded_number: column(row, "degraded_number")?,
        hired_at: column(row, "hired_at")?,
    })
}

pub fn attendance_from_row(row: &Row) -> Result<Attendance> {
    Ok(Attendance {
        id: AttendanceId::from_uuid(column::<Uuid>(row, "id")?),
        employee_id: EmployeeId::from_uuid(column::<Uuid>(row, "employee_id")?),
        shift_date: column(row, "shift_date")?,
        check_in: column(row, "check_in")?,
        check_out: column(row, "check_out")?,
        status: text_column(row, "status")?,
        overtime_seconds: column(row, "overtime_seconds")?,
    })
}
