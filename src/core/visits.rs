//! Visit lifecycle and department queues
//!
//! A visit starts QUEUED with an entry at the back of its department queue,
//! becomes ACTIVE when it is called from the front of the queue, and ends
//! COMPLETED. A patient has at most one non-completed visit per department;
//! creation checks this under a (patient, department) key lock, and the
//! PostgreSQL schema backs it with a partial unique index.

use super::audit;
use super::events::EventBus;
use super::numbering::CounterService;
use super::{finish, finish_read};
use crate::adapters::database::{InventoryTx, LedgerStore, LedgerTransaction, VisitTx};
use crate::domain::events::VisitChanged;
use crate::domain::{
    CaduceusError, DepartmentCode, DomainEvent, NewVisit, Precondition, QueueEntry, Result, Visit,
    VisitId, VisitStatus,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Visit service over a transactional store
pub struct VisitService {
    store: Arc<dyn LedgerStore>,
    counters: Arc<CounterService>,
    bus: Arc<EventBus>,
}

impl VisitService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        counters: Arc<CounterService>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            counters,
            bus,
        }
    }

    /// Open a visit and queue it in its department
    ///
    /// The visit number is minted before the transaction starts, so a
    /// rejected visit leaves a gap in the department's sequence.
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::NotFound`] if the department does not exist
    /// - [`Precondition::DuplicateActiveVisit`] if the patient already has a
    ///   non-completed visit in the department
    /// - [`CaduceusError::Unavailable`] if no visit number can be minted
    pub async fn create(&self, request: NewVisit) -> Result<Visit> {
        let number = self
            .counters
            .visit_number(&request.department, request.visit_type)
            .await?;

        let now = Utc::now();
        let visit = Visit {
            id: VisitId::new(),
            visit_number: number.value,
            patient_id: request.patient_id,
            department: request.department,
            visit_type: request.visit_type,
            status: VisitStatus::Queued,
            degraded_number: number.degraded,
            created_at: now,
            updated_at: now,
        };
        let event = DomainEvent::VisitCreated(VisitChanged {
            visit_id: visit.id,
            at: now,
        });

        let mut tx = self.store.begin().await?;
        let outcome = create_tx(&mut *tx, &visit, &event).await;
        let entry = finish(tx, "create_visit", outcome).await?;

        crate::log_ledger_mutation!(
            "visit",
            &visit.id,
            "create_visit",
            visit_number = %visit.visit_number,
            department = %visit.department,
            queue_sequence = entry.sequence,
            degraded_number = visit.degraded_number
        );
        self.bus.publish(event);
        Ok(visit)
    }

    /// Call the next waiting visit in a department
    ///
    /// Returns `Ok(None)` when nobody is waiting.
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::NotFound`] if the department does not exist
    pub async fn next_in_queue(&self, department: &DepartmentCode) -> Result<Option<Visit>> {
        let mut tx = self.store.begin().await?;
        let outcome = next_in_queue_tx(&mut *tx, department).await;
        let visit = finish(tx, "next_in_queue", outcome).await?;

        match &visit {
            Some(visit) => {
                crate::log_ledger_mutation!(
                    "visit",
                    &visit.id,
                    "next_in_queue",
                    department = %department
                );
            }
            None => tracing::debug!(department = %department, "Queue is empty"),
        }
        Ok(visit)
    }

    /// Close a queued or active visit
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::NotFound`] if the visit does not exist
    /// - [`Precondition::InvalidTransition`] if the visit is already completed
    pub async fn complete(&self, visit_id: VisitId) -> Result<Visit> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            let mut visit = lock_visit(&mut *tx, visit_id).await?;
            transition(&visit, VisitStatus::Completed)?;

            let now = Utc::now();
            tx.update_visit_status(visit_id, VisitStatus::Completed, now)
                .await?;
            tx.remove_queue_entry(visit_id).await?;

            let event = DomainEvent::VisitCompleted(VisitChanged { visit_id, at: now });
            audit::record_event(&mut *tx, &event, None).await?;

            visit.status = VisitStatus::Completed;
            visit.updated_at = now;
            Ok::<_, CaduceusError>((visit, event))
        }
        .await;
        let (visit, event) = finish(tx, "complete_visit", outcome).await?;

        crate::log_ledger_mutation!("visit", &visit_id, "complete_visit");
        self.bus.publish(event);
        Ok(visit)
    }

    /// Waiting visits in a department, front of the queue first
    pub async fn queue(&self, department: &DepartmentCode) -> Result<Vec<QueueEntry>> {
        let mut tx = self.store.begin().await?;
        let outcome = tx.queue(department).await;
        finish_read(tx, "queue", outcome).await
    }

    /// Fetch one visit
    pub async fn visit(&self, visit_id: VisitId) -> Result<Visit> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .visit(visit_id)
            .await
            .and_then(|found| found.ok_or_else(|| CaduceusError::not_found("visit", visit_id)));
        finish_read(tx, "visit", outcome).await
    }
}

async fn create_tx(
    tx: &mut dyn LedgerTransaction,
    visit: &Visit,
    event: &DomainEvent,
) -> Result<QueueEntry> {
    if tx.department(&visit.department).await?.is_none() {
        return Err(CaduceusError::not_found("department", &visit.department));
    }

    tx.lock_visit_scope(&visit.patient_id, &visit.department)
        .await?;
    if let Some(open) = tx.open_visit(&visit.patient_id, &visit.department).await? {
        return Err(Precondition::DuplicateActiveVisit {
            patient_id: visit.patient_id.to_string(),
            department: visit.department.to_string(),
            visit_number: open.visit_number,
        }
        .into());
    }

    tx.insert_visit(visit).await?;
    let entry = tx
        .enqueue(visit.id, &visit.department, visit.created_at)
        .await?;
    audit::record_event(tx, event, None).await?;
    Ok(entry)
}

async fn next_in_queue_tx(
    tx: &mut dyn LedgerTransaction,
    department: &DepartmentCode,
) -> Result<Option<Visit>> {
    if tx.department(department).await?.is_none() {
        return Err(CaduceusError::not_found("department", department));
    }

    while let Some(entry) = tx.lock_queue_head(department).await? {
        let visit = tx.lock_visit(entry.visit_id).await?;
        tx.remove_queue_entry(entry.visit_id).await?;

        // Entries whose visit was completed while waiting are dropped.
        let Some(mut visit) = visit.filter(|v| v.status.can_transition_to(VisitStatus::Active))
        else {
            tracing::warn!(
                visit_id = %entry.visit_id,
                department = %department,
                "Dropping stale queue entry"
            );
            continue;
        };

        let now = Utc::now();
        tx.update_visit_status(visit.id, VisitStatus::Active, now)
            .await?;
        audit::record(
            tx,
            "VisitActivated",
            json!({ "visitId": visit.id, "department": department, "at": now }),
            None,
        )
        .await?;

        visit.status = VisitStatus::Active;
        visit.updated_at = now;
        return Ok(Some(visit));
    }
    Ok(None)
}

async fn lock_visit(tx: &mut dyn LedgerTransaction, visit_id: VisitId) -> Result<Visit> {
    tx.lock_visit(visit_id)
        .await?
        .ok_or_else(|| CaduceusError::not_found("visit", visit_id))
}

fn transition(visit: &Visit, next: VisitStatus) -> Result<()> {
    if visit.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(Precondition::InvalidTransition {
            entity: "visit",
            from: visit.status.to_string(),
            to: next.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::counter::MemoryCounterStore;
    use crate::adapters::memory::MemoryLedgerStore;
    use crate::domain::{Department, PatientId, VisitType};

    async fn service() -> VisitService {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        for code in ["OPD", "ER"] {
            tx.upsert_department(&Department::new(DepartmentCode::new(code).unwrap(), code))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        VisitService::new(
            Arc::new(store),
            Arc::new(CounterService::new(Arc::new(MemoryCounterStore::new()), true)),
            Arc::new(EventBus::new("test")),
        )
    }

    fn opd_visit(patient: &str) -> NewVisit {
        NewVisit::new(
            PatientId::new(patient).unwrap(),
            DepartmentCode::new("OPD").unwrap(),
            VisitType::Opd,
        )
    }

    #[tokio::test]
    async fn test_visit_numbers_are_scoped() {
        let service = service().await;
        let a = service.create(opd_visit("P-1")).await.unwrap();
        let b = service.create(opd_visit("P-2")).await.unwrap();
        let er = service
            .create(NewVisit::new(
                PatientId::new("P-1").unwrap(),
                DepartmentCode::new("ER").unwrap(),
                VisitType::Emergency,
            ))
            .await
            .unwrap();

        assert_eq!(a.visit_number, "OPD-OPD-00001");
        assert_eq!(b.visit_number, "OPD-OPD-00002");
        assert_eq!(er.visit_number, "ER-EMR-00001");
        assert_eq!(a.status, VisitStatus::Queued);
    }

    #[tokio::test]
    async fn test_second_open_visit_rejected_until_completed() {
        let service = service().await;
        let first = service.create(opd_visit("P-1")).await.unwrap();

        let err = service.create(opd_visit("P-1")).await.unwrap_err();
        match err.precondition() {
            Some(Precondition::DuplicateActiveVisit { visit_number, .. }) => {
                assert_eq!(visit_number, &first.visit_number)
            }
            other => panic!("unexpected {other:?}"),
        }

        service.complete(first.id).await.unwrap();
        assert!(service.create(opd_visit("P-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_department() {
        let service = service().await;
        let err = service
            .create(NewVisit::new(
                PatientId::new("P-1").unwrap(),
                DepartmentCode::new("ICU").unwrap(),
                VisitType::Ipd,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CaduceusError::NotFound { entity: "department", .. }));
    }

    #[tokio::test]
    async fn test_complete_twice_is_invalid_transition() {
        let service = service().await;
        let visit = service.create(opd_visit("P-1")).await.unwrap();
        let done = service.complete(visit.id).await.unwrap();
        assert_eq!(done.status, VisitStatus::Completed);

        let err = service.complete(visit.id).await.unwrap_err();
        assert!(matches!(
            err.precondition(),
            Some(Precondition::InvalidTransition { entity: "visit", .. })
        ));
    }

    #[tokio::test]
    async fn test_completed_visit_leaves_queue() {
        let service = service().await;
        let opd = DepartmentCode::new("OPD").unwrap();
        let a = service.create(opd_visit("P-1")).await.unwrap();
        let b = service.create(opd_visit("P-2")).await.unwrap();

        service.complete(a.id).await.unwrap();
        let queue = service.queue(&opd).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].visit_id, b.id);

        let next = service.next_in_queue(&opd).await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
        assert_eq!(next.status, VisitStatus::Active);
        assert_eq!(service.visit(b.id).await.unwrap().status, VisitStatus::Active);
    }
}
