//! PostgreSQL adapter implementing the ledger store traits
//!
//! Each [`PostgreSQLTransaction`] owns one pooled connection for its whole
//! life and runs at READ COMMITTED with `SET LOCAL lock_timeout`. Row locks
//! use `SELECT ... FOR UPDATE`; keys that have no row yet (item slots, the
//! patient/department visit scope, queue heads) use transaction-scoped
//! advisory locks.

use crate::adapters::database::traits::{
    BillingTx, InventoryTx, LedgerStore, LedgerTransaction, VisitTx, WorkforceTx,
};
use crate::adapters::postgresql::client::{map_pg_error, PostgreSQLClient};
use crate::adapters::postgresql::models::{
    attendance_from_row, claim_from_row, department_from_row, employee_from_row,
    invoice_from_row, item_from_row, movement_from_row, payment_from_row, queue_entry_from_row,
    visit_from_row, ATTENDANCE_COLUMNS, CLAIM_COLUMNS, EMPLOYEE_COLUMNS, INVOICE_COLUMNS,
    ITEM_COLUMNS, MOVEMENT_COLUMNS, PAYMENT_COLUMNS, QUEUE_COLUMNS, VISIT_COLUMNS,
};
use crate::domain::billing::{InsuranceClaim, Invoice, InvoiceStatus, Payment};
use crate::domain::ids::{
    ClaimId, DepartmentCode, EmployeeId, InvoiceId, ItemId, PatientId, VisitId,
};
use crate::domain::inventory::{Department, InventoryItem, StockMovement};
use crate::domain::visit::{QueueEntry, Visit, VisitStatus};
use crate::domain::workforce::{Attendance, Employee, Payroll};
use crate::domain::{AuditEntry, CaduceusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::Object;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::Row;

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// PostgreSQL implementation of [`LedgerStore`]
pub struct PostgreSQLLedgerStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLLedgerStore {
    /// Create a new PostgreSQL ledger store
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a store sharing an existing client (and its pool)
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl LedgerStore for PostgreSQLLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        let client = self.client.get_connection().await?;
        let begin = format!(
            "BEGIN ISOLATION LEVEL READ COMMITTED; SET LOCAL lock_timeout = {}",
            self.client.lock_timeout().as_millis()
        );

        if let Err(e) = client.batch_execute(&begin).await {
            drop(Object::take(client));
            return Err(map_pg_error("Failed to begin transaction", e));
        }

        Ok(Box::new(PostgreSQLTransaction {
            client: Some(client),
        }))
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}

/// An open PostgreSQL transaction
///
/// A transaction dropped without commit or rollback detaches its connection
/// from the pool; closing the connection makes the server roll back.
pub struct PostgreSQLTransaction {
    client: Option<Object>,
}

impl Drop for PostgreSQLTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            drop(Object::take(client));
            tracing::debug!("Transaction dropped while open, connection discarded");
        }
    }
}

impl PostgreSQLTransaction {
    fn conn(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| CaduceusError::Database("Transaction already finished".to_string()))
    }

    async fn query(&self, sql: &str, params: Params<'_>) -> Result<Vec<Row>> {
        self.conn()?
            .query(sql, params)
            .await
            .map_err(|e| map_pg_error("Query failed", e))
    }

    async fn query_opt(&self, sql: &str, params: Params<'_>) -> Result<Option<Row>> {
        self.conn()?
            .query_opt(sql, params)
            .await
            .map_err(|e| map_pg_error("Query failed", e))
    }

    async fn query_one(&self, sql: &str, params: Params<'_>) -> Result<Row> {
        self.conn()?
            .query_one(sql, params)
            .await
            .map_err(|e| map_pg_error("Query failed", e))
    }

    async fn execute(&self, sql: &str, params: Params<'_>) -> Result<u64> {
        self.conn()?
            .execute(sql, params)
            .await
            .map_err(|e| map_pg_error("Statement execution failed", e))
    }

    /// Update exactly one row or report the entity as missing
    async fn execute_one(
        &self,
        sql: &str,
        params: Params<'_>,
        entity: &'static str,
        id: impl ToString + Send,
    ) -> Result<()> {
        match self.execute(sql, params).await? {
            0 => Err(CaduceusError::not_found(entity, id)),
            _ => Ok(()),
        }
    }

    /// Transaction-scoped advisory lock on an arbitrary key
    async fn advisory_lock(&self, key: &str) -> Result<()> {
        self.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&key])
            .await?;
        Ok(())
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let client = self
            .client
            .take()
            .ok_or_else(|| CaduceusError::Database("Transaction already finished".to_string()))?;

        match client.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(Object::take(client));
                Err(map_pg_error("Failed to finish transaction", e))
            }
        }
    }
}

fn dept_str(code: &Option<DepartmentCode>) -> Option<&str> {
    code.as_ref().map(DepartmentCode::as_str)
}

#[async_trait]
impl InventoryTx for PostgreSQLTransaction {
    async fn department(&mut self, code: &DepartmentCode) -> Result<Option<Department>> {
        self.query_opt(
            "SELECT code, name FROM departments WHERE code = $1",
            &[&code.as_str()],
        )
        .await?
        .as_ref()
        .map(department_from_row)
        .transpose()
    }

    async fn upsert_department(&mut self, department: &Department) -> Result<()> {
        self.execute(
            "INSERT INTO departments (code, name) VALUES ($1, $2) \
             ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name",
            &[&department.code.as_str(), &department.name],
        )
        .await?;
        Ok(())
    }

    async fn item(&mut self, id: ItemId) -> Result<Option<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn lock_item_slot(
        &mut self,
        name: &str,
        batch: Option<&str>,
        department: &DepartmentCode,
    ) -> Result<Option<InventoryItem>> {
        self.advisory_lock(&format!(
            "slot:{name}:{}:{department}",
            batch.unwrap_or_default()
        ))
        .await?;

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE name = $1 AND batch IS NOT DISTINCT FROM $2 AND department_code = $3 \
             ORDER BY created_at LIMIT 1 FOR UPDATE"
        );
        self.query_opt(&sql, &[&name, &batch, &department.as_str()])
            .await?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn insert_item(&mut self, item: &InventoryItem) -> Result<()> {
        self.execute(
            "INSERT INTO inventory_items (id, name, sku, batch, expiry, quantity, \
             initial_quantity, department_code, catalog_ref, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &item.id.as_uuid(),
                &item.name,
                &item.sku,
                &item.batch,
                &item.expiry,
                &item.quantity,
                &item.initial_quantity,
                &dept_str(&item.department),
                &item.catalog_ref,
                &item.created_at,
                &item.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn update_item_quantity(
        &mut self,
        id: ItemId,
        quantity: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute_one(
            "UPDATE inventory_items SET quantity = $2, updated_at = $3 WHERE id = $1",
            &[&id.as_uuid(), &quantity, &updated_at],
            "inventory item",
            id,
        )
        .await
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()> {
        self.execute(
            "INSERT INTO stock_movements (id, item_id, from_department, to_department, delta, \
             movement_type, reason, actor, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &movement.id.as_uuid(),
                &movement.item_id.as_uuid(),
                &dept_str(&movement.from_department),
                &dept_str(&movement.to_department),
                &movement.delta,
                &movement.movement_type.to_string(),
                &movement.reason,
                &movement.actor,
                &movement.created_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn movements(&mut self, item: ItemId) -> Result<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE item_id = $1 ORDER BY created_at"
        );
        self.query(&sql, &[&item.as_uuid()])
            .await?
            .iter()
            .map(movement_from_row)
            .collect()
    }

    async fn sum_movement_deltas(&mut self, item: ItemId) -> Result<Decimal> {
        let row = self
            .query_one(
                "SELECT COALESCE(SUM(delta), 0) AS total FROM stock_movements WHERE item_id = $1",
                &[&item.as_uuid()],
            )
            .await?;
        row.try_get("total")
            .map_err(|e| CaduceusError::Database(format!("Failed to read movement total: {e}")))
    }
}

#[async_trait]
impl BillingTx for PostgreSQLTransaction {
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.execute(
            "INSERT INTO invoices (id, patient_id, items, total_amount, \
             insurance_covered_amount, patient_responsible, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &invoice.id.as_uuid(),
                &invoice.patient_id.as_ref().map(PatientId::as_str),
                &Json(&invoice.items),
                &invoice.total_amount,
                &invoice.insurance_covered_amount,
                &invoice.patient_responsible,
                &invoice.status.to_string(),
                &invoice.created_at,
                &invoice.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(invoice_from_row)
            .transpose()
    }

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(invoice_from_row)
            .transpose()
    }

    async fn update_invoice_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute_one(
            "UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1",
            &[&id.as_uuid(), &status.to_string(), &updated_at],
            "invoice",
            id,
        )
        .await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.execute(
            "INSERT INTO payments (id, invoice_id, amount, method, provider, reference, \
             received_by, received_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &payment.id.as_uuid(),
                &payment.invoice_id.as_uuid(),
                &payment.amount,
                &payment.method.to_string(),
                &payment.provider,
                &payment.reference,
                &payment.received_by,
                &payment.received_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn sum_payments(&mut self, invoice: InvoiceId) -> Result<Decimal> {
        let row = self
            .query_one(
                "SELECT COALESCE(SUM(amount), 0) AS paid FROM payments WHERE invoice_id = $1",
                &[&invoice.as_uuid()],
            )
            .await?;
        row.try_get("paid")
            .map_err(|e| CaduceusError::Database(format!("Failed to read payment total: {e}")))
    }

    async fn payments(&mut self, invoice: InvoiceId) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY received_at"
        );
        self.query(&sql, &[&invoice.as_uuid()])
            .await?
            .iter()
            .map(payment_from_row)
            .collect()
    }

    async fn insert_claim(&mut self, claim: &InsuranceClaim) -> Result<()> {
        self.execute(
            "INSERT INTO insurance_claims (id, invoice_id, provider, claimed_amount, \
             approved_amount, status, payment_id, submitted_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &claim.id.as_uuid(),
                &claim.invoice_id.as_uuid(),
                &claim.provider,
                &claim.claimed_amount,
                &claim.approved_amount,
                &claim.status.to_string(),
                &claim.payment_id.map(|p| p.as_uuid()),
                &claim.submitted_at,
                &claim.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn lock_claim(&mut self, id: ClaimId) -> Result<Option<InsuranceClaim>> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM insurance_claims WHERE id = $1 FOR UPDATE");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(claim_from_row)
            .transpose()
    }

    async fn update_claim(&mut self, claim: &InsuranceClaim) -> Result<()> {
        self.execute_one(
            "UPDATE insurance_claims SET approved_amount = $2, status = $3, payment_id = $4, \
             updated_at = $5 WHERE id = $1",
            &[
                &claim.id.as_uuid(),
                &claim.approved_amount,
                &claim.status.to_string(),
                &claim.payment_id.map(|p| p.as_uuid()),
                &claim.updated_at,
            ],
            "insurance claim",
            claim.id,
        )
        .await
    }
}

#[async_trait]
impl VisitTx for PostgreSQLTransaction {
    async fn lock_visit_scope(
        &mut self,
        patient: &PatientId,
        department: &DepartmentCode,
    ) -> Result<()> {
        self.advisory_lock(&format!("visit-scope:{patient}:{department}"))
            .await
    }

    async fn open_visit(
        &mut self,
        patient: &PatientId,
        department: &DepartmentCode,
    ) -> Result<Option<Visit>> {
        let sql = format!(
            "SELECT {VISIT_COLUMNS} FROM visits \
             WHERE patient_id = $1 AND department_code = $2 AND status <> 'completed' LIMIT 1"
        );
        self.query_opt(&sql, &[&patient.as_str(), &department.as_str()])
            .await?
            .as_ref()
            .map(visit_from_row)
            .transpose()
    }

    async fn insert_visit(&mut self, visit: &Visit) -> Result<()> {
        self.execute(
            "INSERT INTO visits (id, visit_number, patient_id, department_code, visit_type, \
             status, degraded_number, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &visit.id.as_uuid(),
                &visit.visit_number,
                &visit.patient_id.as_str(),
                &visit.department.as_str(),
                &visit.visit_type.code(),
                &visit.status.to_string(),
                &visit.degraded_number,
                &visit.created_at,
                &visit.updated_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn visit(&mut self, id: VisitId) -> Result<Option<Visit>> {
        let sql = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(visit_from_row)
            .transpose()
    }

    async fn lock_visit(&mut self, id: VisitId) -> Result<Option<Visit>> {
        let sql = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1 FOR UPDATE");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(visit_from_row)
            .transpose()
    }

    async fn update_visit_status(
        &mut self,
        id: VisitId,
        status: VisitStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute_one(
            "UPDATE visits SET status = $2, updated_at = $3 WHERE id = $1",
            &[&id.as_uuid(), &status.to_string(), &updated_at],
            "visit",
            id,
        )
        .await
    }

    async fn enqueue(
        &mut self,
        visit: VisitId,
        department: &DepartmentCode,
        enqueued_at: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let row = self
            .query_one(
                "INSERT INTO queue_entries (visit_id, department_code, enqueued_at) \
                 VALUES ($1, $2, $3) RETURNING sequence",
                &[&visit.as_uuid(), &department.as_str(), &enqueued_at],
            )
            .await?;
        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| CaduceusError::Database(format!("Failed to read queue sequence: {e}")))?;

        Ok(QueueEntry {
            visit_id: visit,
            department: department.clone(),
            enqueued_at,
            sequence,
        })
    }

    async fn lock_queue_head(
        &mut self,
        department: &DepartmentCode,
    ) -> Result<Option<QueueEntry>> {
        self.advisory_lock(&format!("queue:{department}")).await?;

        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE department_code = $1 \
             ORDER BY enqueued_at, sequence LIMIT 1 FOR UPDATE SKIP LOCKED"
        );
        self.query_opt(&sql, &[&department.as_str()])
            .await?
            .as_ref()
            .map(queue_entry_from_row)
            .transpose()
    }

    async fn remove_queue_entry(&mut self, visit: VisitId) -> Result<()> {
        self.execute(
            "DELETE FROM queue_entries WHERE visit_id = $1",
            &[&visit.as_uuid()],
        )
        .await?;
        Ok(())
    }

    async fn queue(&mut self, department: &DepartmentCode) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE department_code = $1 \
             ORDER BY enqueued_at, sequence"
        );
        self.query(&sql, &[&department.as_str()])
            .await?
            .iter()
            .map(queue_entry_from_row)
            .collect()
    }
}

#[async_trait]
impl WorkforceTx for PostgreSQLTransaction {
    async fn insert_employee(&mut self, employee: &Employee) -> Result<()> {
        self.execute(
            "INSERT INTO employees (id, employee_number, name, department_code, hourly_rate, \
             degraded_number, hired_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &employee.id.as_uuid(),
                &employee.employee_number,
                &employee.name,
                &dept_str(&employee.department),
                &employee.hourly_rate,
                &employee.degraded_number,
                &employee.hired_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn lock_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1 FOR UPDATE");
        self.query_opt(&sql, &[&id.as_uuid()])
            .await?
            .as_ref()
            .map(employee_from_row)
            .transpose()
    }

    async fn open_attendance(&mut self, employee: EmployeeId) -> Result<Option<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE employee_id = $1 AND check_out IS NULL ORDER BY check_in DESC LIMIT 1"
        );
        self.query_opt(&sql, &[&employee.as_uuid()])
            .await?
            .as_ref()
            .map(attendance_from_row)
            .transpose()
    }

    async fn attendance_on(
        &mut self,
        employee: EmployeeId,
        shift_date: NaiveDate,
    ) -> Result<Vec<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
             WHERE employee_id = $1 AND shift_date = $2 ORDER BY check_in"
        );
        self.query(&sql, &[&employee.as_uuid(), &shift_date])
            .await?
            .iter()
            .map(attendance_from_row)
            .collect()
    }

    async fn insert_attendance(&mut self, attendance: &Attendance) -> Result<()> {
        self.execute(
            "INSERT INTO attendance (id, employee_id, shift_date, check_in, check_out, status, \
             overtime_seconds) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &attendance.id.as_uuid(),
                &attendance.employee_id.as_uuid(),
                &attendance.shift_date,
                &attendance.check_in,
                &attendance.check_out,
                &attendance.status.to_string(),
                &attendance.overtime_seconds,
            ],
        )
        .await?;
        Ok(())
    }

    async fn update_attendance(&mut self, attendance: &Attendance) -> Result<()> {
        self.execute_one(
            "UPDATE attendance SET check_out = $2, status = $3, overtime_seconds = $4 \
             WHERE id = $1",
            &[
                &attendance.id.as_uuid(),
                &attendance.check_out,
                &attendance.status.to_string(),
                &attendance.overtime_seconds,
            ],
            "attendance",
            attendance.id,
        )
        .await
    }

    async fn sum_overtime_seconds(
        &mut self,
        employee: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64> {
        let row = self
            .query_one(
                "SELECT COALESCE(SUM(overtime_seconds), 0)::BIGINT AS overtime FROM attendance \
                 WHERE employee_id = $1 AND shift_date BETWEEN $2 AND $3",
                &[&employee.as_uuid(), &from, &to],
            )
            .await?;
        row.try_get("overtime")
            .map_err(|e| CaduceusError::Database(format!("Failed to read overtime total: {e}")))
    }

    async fn payroll_exists(
        &mut self,
        employee: EmployeeId,
        period_start: NaiveDate,
    ) -> Result<bool> {
        let row = self
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM payrolls WHERE employee_id = $1 \
                 AND period_start = $2) AS present",
                &[&employee.as_uuid(), &period_start],
            )
            .await?;
        row.try_get("present")
            .map_err(|e| CaduceusError::Database(format!("Failed to read payroll check: {e}")))
    }

    async fn insert_payroll(&mut self, payroll: &Payroll) -> Result<()> {
        self.execute(
            "INSERT INTO payrolls (id, employee_id, period_start, period_end, base_pay, \
             overtime_seconds, overtime_pay, allowances, deductions, net_pay, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &payroll.id.as_uuid(),
                &payroll.employee_id.as_uuid(),
                &payroll.period_start,
                &payroll.period_end,
                &payroll.base_pay,
                &payroll.overtime_seconds,
                &payroll.overtime_pay,
                &payroll.allowances,
                &payroll.deductions,
                &payroll.net_pay,
                &payroll.processed_at,
            ],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for PostgreSQLTransaction {
    async fn insert_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.execute(
            "INSERT INTO audit_log (id, event_type, payload, actor, recorded_at) \
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &entry.id.as_uuid(),
                &entry.event_type,
                &entry.payload,
                &entry.actor,
                &entry.recorded_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.finish("ROLLBACK").await
    }
}
