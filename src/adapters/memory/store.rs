//! In-memory ledger store
//!
//! Committed state lives behind a single `RwLock`. A transaction stages its
//! writes privately and applies them in one step at commit, so readers never
//! observe a half-applied operation. Row and key locks are per-key async
//! mutexes held for the life of the transaction; waiting longer than the
//! configured lock timeout fails with [`CaduceusError::Unavailable`], the
//! same way a Postgres `lock_timeout` does.

use crate::adapters::database::traits::{
    BillingTx, InventoryTx, LedgerStore, LedgerTransaction, VisitTx, WorkforceTx,
};
use crate::domain::billing::{InsuranceClaim, Invoice, InvoiceStatus, Payment};
use crate::domain::ids::{
    AttendanceId, ClaimId, DepartmentCode, EmployeeId, InvoiceId, ItemId, PatientId, VisitId,
};
use crate::domain::inventory::{Department, InventoryItem, StockMovement};
use crate::domain::visit::{QueueEntry, Visit, VisitStatus};
use crate::domain::workforce::{Attendance, Employee, Payroll};
use crate::domain::{AuditEntry, CaduceusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default wait before a lock request gives up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct MemoryState {
    departments: HashMap<DepartmentCode, Department>,
    items: HashMap<ItemId, InventoryItem>,
    movements: Vec<StockMovement>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: Vec<Payment>,
    claims: HashMap<ClaimId, InsuranceClaim>,
    visits: HashMap<VisitId, Visit>,
    queue: Vec<QueueEntry>,
    employees: HashMap<EmployeeId, Employee>,
    attendance: HashMap<AttendanceId, Attendance>,
    payrolls: Vec<Payroll>,
    audit: Vec<AuditEntry>,
}

/// Writes made by one transaction, not yet visible to anyone else
#[derive(Debug, Default)]
struct StagedWrites {
    departments: HashMap<DepartmentCode, Department>,
    items: HashMap<ItemId, InventoryItem>,
    movements: Vec<StockMovement>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: Vec<Payment>,
    claims: HashMap<ClaimId, InsuranceClaim>,
    visits: HashMap<VisitId, Visit>,
    enqueued: Vec<QueueEntry>,
    dequeued: HashSet<VisitId>,
    employees: HashMap<EmployeeId, Employee>,
    attendance: HashMap<AttendanceId, Attendance>,
    payrolls: Vec<Payroll>,
    audit: Vec<AuditEntry>,
}

impl StagedWrites {
    fn is_empty(&self) -> bool {
        self.departments.is_empty()
            && self.items.is_empty()
            && self.movements.is_empty()
            && self.invoices.is_empty()
            && self.payments.is_empty()
            && self.claims.is_empty()
            && self.visits.is_empty()
            && self.enqueued.is_empty()
            && self.dequeued.is_empty()
            && self.employees.is_empty()
            && self.attendance.is_empty()
            && self.payrolls.is_empty()
            && self.audit.is_empty()
    }

    fn apply(self, state: &mut MemoryState) {
        state.departments.extend(self.departments);
        state.items.extend(self.items);
        state.movements.extend(self.movements);
        state.invoices.extend(self.invoices);
        state.payments.extend(self.payments);
        state.claims.extend(self.claims);
        state.visits.extend(self.visits);
        if !self.dequeued.is_empty() {
            state
                .queue
                .retain(|entry| !self.dequeued.contains(&entry.visit_id));
        }
        state.queue.extend(self.enqueued);
        state.employees.extend(self.employees);
        state.attendance.extend(self.attendance);
        state.payrolls.extend(self.payrolls);
        state.audit.extend(self.audit);
    }
}

/// Per-key async mutexes, created on first use
#[derive(Debug)]
struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl LockTable {
    async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        tokio::time::timeout(self.timeout, mutex.lock_owned())
            .await
            .map_err(|_| {
                CaduceusError::Unavailable(format!(
                    "lock wait on {key} exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })
    }
}

/// Ledger store that keeps everything in process memory
///
/// Used by the test suite and by single-instance deployments that do not need
/// durability. Cloning shares the same underlying state.
#[derive(Debug, Clone)]
pub struct MemoryLedgerStore {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockTable>,
    queue_sequence: Arc<AtomicI64>,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            locks: Arc::new(LockTable {
                locks: DashMap::new(),
                timeout,
            }),
            queue_sequence: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Committed audit rows, oldest first
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().audit.clone()
    }

    /// Number of committed stock movements across all items
    pub fn movement_count(&self) -> usize {
        self.state.read().movements.len()
    }

    /// Number of committed payments across all invoices
    pub fn payment_count(&self) -> usize {
        self.state.read().payments.len()
    }

    fn transaction(&self) -> MemoryTransaction {
        MemoryTransaction {
            state: Arc::clone(&self.state),
            locks: Arc::clone(&self.locks),
            queue_sequence: Arc::clone(&self.queue_sequence),
            held: Vec::new(),
            held_keys: HashSet::new(),
            staged: StagedWrites::default(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        Ok(Box::new(self.transaction()))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// A transaction against [`MemoryLedgerStore`]
///
/// Dropping it without commit discards the staged writes and releases the
/// locks it holds.
pub struct MemoryTransaction {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockTable>,
    queue_sequence: Arc<AtomicI64>,
    held: Vec<OwnedMutexGuard<()>>,
    held_keys: HashSet<String>,
    staged: StagedWrites,
}

/// Committed rows overlaid with staged rows of the same key
fn overlay<K, V>(committed: &HashMap<K, V>, staged: &HashMap<K, V>) -> Vec<V>
where
    K: Eq + Hash,
    V: Clone,
{
    committed
        .iter()
        .filter(|(key, _)| !staged.contains_key(*key))
        .map(|(_, value)| value.clone())
        .chain(staged.values().cloned())
        .collect()
}

fn lookup<K, V>(committed: &HashMap<K, V>, staged: &HashMap<K, V>, key: &K) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
{
    staged.get(key).or_else(|| committed.get(key)).cloned()
}

impl MemoryTransaction {
    /// Take a key lock unless this transaction already holds it
    async fn lock(&mut self, key: String) -> Result<()> {
        if self.held_keys.contains(&key) {
            return Ok(());
        }
        let guard = self.locks.acquire(&key).await?;
        self.held.push(guard);
        self.held_keys.insert(key);
        Ok(())
    }

    fn find_item(&self, id: ItemId) -> Option<InventoryItem> {
        lookup(&self.state.read().items, &self.staged.items, &id)
    }

    fn find_invoice(&self, id: InvoiceId) -> Option<Invoice> {
        lookup(&self.state.read().invoices, &self.staged.invoices, &id)
    }

    fn find_visit(&self, id: VisitId) -> Option<Visit> {
        lookup(&self.state.read().visits, &self.staged.visits, &id)
    }

    fn merged_queue(&self, department: &DepartmentCode) -> Vec<QueueEntry> {
        let state = self.state.read();
        let mut entries: Vec<QueueEntry> = state
            .queue
            .iter()
            .filter(|e| &e.department == department && !self.staged.dequeued.contains(&e.visit_id))
            .chain(
                self.staged
                    .enqueued
                    .iter()
                    .filter(|e| &e.department == department),
            )
            .cloned()
            .collect();
        entries.sort_by_key(QueueEntry::order_key);
        entries
    }

    fn merged_attendance(&self, employee: EmployeeId) -> Vec<Attendance> {
        overlay(&self.state.read().attendance, &self.staged.attendance)
            .into_iter()
            .filter(|a| a.employee_id == employee)
            .collect()
    }
}

#[async_trait]
impl InventoryTx for MemoryTransaction {
    async fn department(&mut self, code: &DepartmentCode) -> Result<Option<Department>> {
        Ok(lookup(
            &self.state.read().departments,
            &self.staged.departments,
            code,
        ))
    }

    async fn upsert_department(&mut self, department: &Department) -> Result<()> {
        self.staged
            .departments
            .insert(department.code.clone(), department.clone());
        Ok(())
    }

    async fn item(&mut self, id: ItemId) -> Result<Option<InventoryItem>> {
        Ok(self.find_item(id))
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<InventoryItem>> {
        self.lock(format!("item:{id}")).await?;
        Ok(self.find_item(id))
    }

    async fn lock_item_slot(
        &mut self,
        name: &str,
        batch: Option<&str>,
        department: &DepartmentCode,
    ) -> Result<Option<InventoryItem>> {
        self.lock(format!(
            "slot:{name}:{}:{department}",
            batch.unwrap_or_default()
        ))
        .await?;

        let found = overlay(&self.state.read().items, &self.staged.items)
            .into_iter()
            .find(|item| item.matches_slot(name, batch, department));

        match found {
            Some(item) => self.lock_item(item.id).await,
            None => Ok(None),
        }
    }

    async fn insert_item(&mut self, item: &InventoryItem) -> Result<()> {
        self.staged.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item_quantity(
        &mut self,
        id: ItemId,
        quantity: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut item = self
            .find_item(id)
            .ok_or_else(|| CaduceusError::not_found("inventory item", id))?;
        item.quantity = quantity;
        item.updated_at = updated_at;
        self.staged.items.insert(id, item);
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<()> {
        self.staged.movements.push(movement.clone());
        Ok(())
    }

    async fn movements(&mut self, item: ItemId) -> Result<Vec<StockMovement>> {
        let state = self.state.read();
        let mut movements: Vec<StockMovement> = state
            .movements
            .iter()
            .chain(self.staged.movements.iter())
            .filter(|m| m.item_id == item)
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.created_at);
        Ok(movements)
    }

    async fn sum_movement_deltas(&mut self, item: ItemId) -> Result<Decimal> {
        let state = self.state.read();
        Ok(state
            .movements
            .iter()
            .chain(self.staged.movements.iter())
            .filter(|m| m.item_id == item)
            .map(|m| m.delta)
            .sum())
    }
}

#[async_trait]
impl BillingTx for MemoryTransaction {
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.staged.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.find_invoice(id))
    }

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>> {
        self.lock(format!("invoice:{id}")).await?;
        Ok(self.find_invoice(id))
    }

    async fn update_invoice_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut invoice = self
            .find_invoice(id)
            .ok_or_else(|| CaduceusError::not_found("invoice", id))?;
        invoice.status = status;
        invoice.updated_at = updated_at;
        self.staged.invoices.insert(id, invoice);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.staged.payments.push(payment.clone());
        Ok(())
    }

    async fn sum_payments(&mut self, invoice: InvoiceId) -> Result<Decimal> {
        let state = self.state.read();
        Ok(state
            .payments
            .iter()
            .chain(self.staged.payments.iter())
            .filter(|p| p.invoice_id == invoice)
            .map(|p| p.amount)
            .sum())
    }

    async fn payments(&mut self, invoice: InvoiceId) -> Result<Vec<Payment>> {
        let state = self.state.read();
        let mut payments: Vec<Payment> = state
            .payments
            .iter()
            .chain(self.staged.payments.iter())
            .filter(|p| p.invoice_id == invoice)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.received_at);
        Ok(payments)
    }

    async fn insert_claim(&mut self, claim: &InsuranceClaim) -> Result<()> {
        self.staged.claims.insert(claim.id, claim.clone());
        Ok(())
    }

    async fn lock_claim(&mut self, id: ClaimId) -> Result<Option<InsuranceClaim>> {
        self.lock(format!("claim:{id}")).await?;
        Ok(lookup(&self.state.read().claims, &self.staged.claims, &id))
    }

    async fn update_claim(&mut self, claim: &InsuranceClaim) -> Result<()> {
        self.staged.claims.insert(claim.id, claim.clone());
        Ok(())
    }
}

#[async_trait]
impl VisitTx for MemoryTransaction {
    async fn lock_visit_scope(
        &mut self,
        patient: &PatientId,
        department: &DepartmentCode,
    ) -> Result<()> {
        self.lock(format!("visit-scope:{patient}:{department}"))
            .await
    }

    async fn open_visit(
        &mut self,
        patient: &PatientId,
        department: &DepartmentCode,
    ) -> Result<Option<Visit>> {
        Ok(overlay(&self.state.read().visits, &self.staged.visits)
            .into_iter()
            .find(|v| &v.patient_id == patient && &v.department == department && v.status.is_open()))
    }

    async fn insert_visit(&mut self, visit: &Visit) -> Result<()> {
        self.staged.visits.insert(visit.id, visit.clone());
        Ok(())
    }

    async fn visit(&mut self, id: VisitId) -> Result<Option<Visit>> {
        Ok(self.find_visit(id))
    }

    async fn lock_visit(&mut self, id: VisitId) -> Result<Option<Visit>> {
        self.lock(format!("visit:{id}")).await?;
        Ok(self.find_visit(id))
    }

    async fn update_visit_status(
        &mut self,
        id: VisitId,
        status: VisitStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut visit = self
            .find_visit(id)
            .ok_or_else(|| CaduceusError::not_found("visit", id))?;
        visit.status = status;
        visit.updated_at = updated_at;
        self.staged.visits.insert(id, visit);
        Ok(())
    }

    async fn enqueue(
        &mut self,
        visit: VisitId,
        department: &DepartmentCode,
        enqueued_at: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let entry = QueueEntry {
            visit_id: visit,
            department: department.clone(),
            enqueued_at,
            sequence: self.queue_sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.staged.enqueued.push(entry.clone());
        Ok(entry)
    }

    async fn lock_queue_head(
        &mut self,
        department: &DepartmentCode,
    ) -> Result<Option<QueueEntry>> {
        self.lock(format!("queue:{department}")).await?;
        Ok(self.merged_queue(department).into_iter().next())
    }

    async fn remove_queue_entry(&mut self, visit: VisitId) -> Result<()> {
        self.staged.enqueued.retain(|e| e.visit_id != visit);
        self.staged.dequeued.insert(visit);
        Ok(())
    }

    async fn queue(&mut self, department: &DepartmentCode) -> Result<Vec<QueueEntry>> {
        Ok(self.merged_queue(department))
    }
}

#[async_trait]
impl WorkforceTx for MemoryTransaction {
    async fn insert_employee(&mut self, employee: &Employee) -> Result<()> {
        self.staged.employees.insert(employee.id, employee.clone());
        Ok(())
    }

    async fn lock_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        self.lock(format!("employee:{id}")).await?;
        Ok(lookup(
            &self.state.read().employees,
            &self.staged.employees,
            &id,
        ))
    }

    async fn open_attendance(&mut self, employee: EmployeeId) -> Result<Option<Attendance>> {
        Ok(self
            .merged_attendance(employee)
            .into_iter()
            .filter(Attendance::is_open)
            .max_by_key(|a| a.check_in))
    }

    async fn attendance_on(
        &mut self,
        employee: EmployeeId,
        shift_date: NaiveDate,
    ) -> Result<Vec<Attendance>> {
        let mut rows: Vec<Attendance> = self
            .merged_attendance(employee)
            .into_iter()
            .filter(|a| a.shift_date == shift_date)
            .collect();
        rows.sort_by_key(|a| a.check_in);
        Ok(rows)
    }

    async fn insert_attendance(&mut self, attendance: &Attendance) -> Result<()> {
        self.staged
            .attendance
            .insert(attendance.id, attendance.clone());
        Ok(())
    }

    async fn update_attendance(&mut self, attendance: &Attendance) -> Result<()> {
        self.staged
            .attendance
            .insert(attendance.id, attendance.clone());
        Ok(())
    }

    async fn sum_overtime_seconds(
        &mut self,
        employee: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64> {
        Ok(self
            .merged_attendance(employee)
            .iter()
            .filter(|a| a.shift_date >= from && a.shift_date <= to)
            .map(|a| a.overtime_seconds)
            .sum())
    }

    async fn payroll_exists(
        &mut self,
        employee: EmployeeId,
        period_start: NaiveDate,
    ) -> Result<bool> {
        let state = self.state.read();
        Ok(state
            .payrolls
            .iter()
            .chain(self.staged.payrolls.iter())
            .any(|p| p.employee_id == employee && p.period_start == period_start))
    }

    async fn insert_payroll(&mut self, payroll: &Payroll) -> Result<()> {
        self.staged.payrolls.push(payroll.clone());
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn insert_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.staged.audit.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            state,
            held,
            staged,
            ..
        } = *self;

        if !staged.is_empty() {
            let mut state = state.write();
            staged.apply(&mut state);
        }

        tracing::trace!(locks = held.len(), "Memory transaction committed");
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::trace!(locks = self.held.len(), "Memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::{MovementType, NewInventoryItem};
    use crate::domain::ids::MovementId;

    fn dept(code: &str) -> DepartmentCode {
        DepartmentCode::new(code).unwrap()
    }

    fn sample_item(department: &str, quantity: i64) -> InventoryItem {
        let draft = NewInventoryItem::new("Gauze", Decimal::from(quantity))
            .with_batch("G1")
            .in_department(dept(department));
        let now = Utc::now();
        InventoryItem {
            id: ItemId::new(),
            name: draft.name,
            sku: None,
            batch: draft.batch,
            expiry: None,
            quantity: draft.quantity,
            initial_quantity: draft.quantity,
            department: draft.department,
            catalog_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryLedgerStore::new();
        let item = sample_item("PHARM", 5);

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&item).await.unwrap();
        assert!(tx.item(item.id).await.unwrap().is_some());

        let mut other = store.begin().await.unwrap();
        assert!(other.item(item.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(other.item(item.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryLedgerStore::new();
        let item = sample_item("PHARM", 5);
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_item(&item).await.unwrap();
            tx.insert_audit(&AuditEntry::new("Test", serde_json::json!({})))
                .await
                .unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.item(item.id).await.unwrap().is_none());
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_lock_wait_times_out_as_unavailable() {
        let store = MemoryLedgerStore::with_lock_timeout(Duration::from_millis(20));
        let id = ItemId::new();

        let mut holder = store.begin().await.unwrap();
        holder.lock_item(id).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_item(id).await.unwrap_err();
        assert!(matches!(err, CaduceusError::Unavailable(_)));

        holder.rollback().await.unwrap();
        assert!(waiter.lock_item(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_relocking_same_key_is_reentrant() {
        let store = MemoryLedgerStore::with_lock_timeout(Duration::from_millis(20));
        let mut tx = store.begin().await.unwrap();
        let id = InvoiceId::new();
        tx.lock_invoice(id).await.unwrap();
        tx.lock_invoice(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_sum_movement_deltas_includes_staged_rows() {
        let store = MemoryLedgerStore::new();
        let item = sample_item("PHARM", 0);
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&item).await.unwrap();
        for delta in [4, -1] {
            tx.insert_movement(&StockMovement {
                id: MovementId::new(),
                item_id: item.id,
                from_department: None,
                to_department: item.department.clone(),
                delta: Decimal::from(delta),
                movement_type: MovementType::Add,
                reason: "count".to_string(),
                actor: "test".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        assert_eq!(tx.sum_movement_deltas(item.id).await.unwrap(), Decimal::from(3));
        tx.commit().await.unwrap();
        assert_eq!(store.movement_count(), 2);
    }

    #[tokio::test]
    async fn test_queue_orders_by_time_then_sequence() {
        let store = MemoryLedgerStore::new();
        let er = dept("ER");
        let at = Utc::now();
        let (a, b) = (VisitId::new(), VisitId::new());

        let mut tx = store.begin().await.unwrap();
        tx.enqueue(a, &er, at).await.unwrap();
        tx.enqueue(b, &er, at).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let head = tx.lock_queue_head(&er).await.unwrap().unwrap();
        assert_eq!(head.visit_id, a);
        tx.remove_queue_entry(a).await.unwrap();
        let ids: Vec<VisitId> = tx.queue(&er).await.unwrap().iter().map(|e| e.visit_id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[tokio::test]
    async fn test_slot_lock_finds_committed_item() {
        let store = MemoryLedgerStore::new();
        let item = sample_item("WARD", 2);
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&item).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx
            .lock_item_slot("Gauze", Some("G1"), &dept("WARD"))
            .await
            .unwrap();
        assert_eq!(found.map(|i| i.id), Some(item.id));
        assert!(tx
            .lock_item_slot("Gauze", None, &dept("WARD"))
            .await
            .unwrap()
            .is_none());
    }
}
