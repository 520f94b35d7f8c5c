//! Integration tests for visits and department queues

use caduceus::config::CaduceusConfig;
use caduceus::core::context::LedgerContext;
use caduceus::domain::{
    CaduceusError, Department, DepartmentCode, DomainEvent, EventKind, NewVisit, PatientId,
    Precondition, VisitStatus, VisitType,
};
use std::sync::{Arc, Mutex};

async fn context_with(departments: &[&str]) -> LedgerContext {
    let context = LedgerContext::from_config(&CaduceusConfig::default())
        .await
        .unwrap();
    for code in departments {
        context
            .stock
            .register_department(Department::new(DepartmentCode::new(*code).unwrap(), *code))
            .await
            .unwrap();
    }
    context
}

fn visit(patient: &str, department: &str) -> NewVisit {
    NewVisit::new(
        PatientId::new(patient).unwrap(),
        DepartmentCode::new(department).unwrap(),
        VisitType::Opd,
    )
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let context = context_with(&["OPD"]).await;
    let opd = DepartmentCode::new("OPD").unwrap();

    let a = context.visits.create(visit("P-A", "OPD")).await.unwrap();
    let b = context.visits.create(visit("P-B", "OPD")).await.unwrap();

    let first = context.visits.next_in_queue(&opd).await.unwrap().unwrap();
    assert_eq!(first.id, a.id);
    assert_eq!(first.status, VisitStatus::Active);

    let second = context.visits.next_in_queue(&opd).await.unwrap().unwrap();
    assert_eq!(second.id, b.id);

    assert!(context.visits.next_in_queue(&opd).await.unwrap().is_none());
}

#[tokio::test]
async fn test_queues_are_per_department() {
    let context = context_with(&["OPD", "LAB"]).await;
    let lab = DepartmentCode::new("LAB").unwrap();

    context.visits.create(visit("P-A", "OPD")).await.unwrap();
    let lab_visit = context.visits.create(visit("P-A", "LAB")).await.unwrap();

    let queue = context.visits.queue(&lab).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].visit_id, lab_visit.id);
    assert_eq!(
        context.visits.next_in_queue(&lab).await.unwrap().map(|v| v.id),
        Some(lab_visit.id)
    );
}

#[tokio::test]
async fn test_one_open_visit_per_department() {
    let context = context_with(&["OPD"]).await;
    let first = context.visits.create(visit("P-A", "OPD")).await.unwrap();

    // Still open while active
    let opd = DepartmentCode::new("OPD").unwrap();
    context.visits.next_in_queue(&opd).await.unwrap();
    let err = context.visits.create(visit("P-A", "OPD")).await.unwrap_err();
    assert!(matches!(
        err.precondition(),
        Some(Precondition::DuplicateActiveVisit { .. })
    ));
    assert_eq!(err.status_code(), 409);

    context.visits.complete(first.id).await.unwrap();
    let again = context.visits.create(visit("P-A", "OPD")).await.unwrap();
    assert_ne!(again.visit_number, first.visit_number);
}

#[tokio::test]
async fn test_concurrent_creation_admits_one_visit() {
    let context = Arc::new(context_with(&["ER"]).await);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let context = Arc::clone(&context);
        handles.push(tokio::spawn(async move {
            context.visits.create(visit("P-RACE", "ER")).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(CaduceusError::PreconditionFailed(Precondition::DuplicateActiveVisit {
                ..
            })) => {}
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert_eq!(created, 1);

    let er = DepartmentCode::new("ER").unwrap();
    assert_eq!(context.visits.queue(&er).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_visit_events_published() {
    let context = context_with(&["OPD"]).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = context.bus.subscribe_all(move |envelope| {
        match &envelope.event {
            DomainEvent::VisitCreated(_) | DomainEvent::VisitCompleted(_) => {
                sink.lock().unwrap().push(envelope.kind())
            }
            _ => {}
        }
        Ok(())
    });

    let created = context.visits.create(visit("P-A", "OPD")).await.unwrap();
    context.visits.complete(created.id).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![EventKind::VisitCreated, EventKind::VisitCompleted]
    );
}

#[tokio::test]
async fn test_completed_visit_is_skipped_by_the_queue() {
    let context = context_with(&["OPD"]).await;
    let opd = DepartmentCode::new("OPD").unwrap();

    let a = context.visits.create(visit("P-A", "OPD")).await.unwrap();
    let b = context.visits.create(visit("P-B", "OPD")).await.unwrap();
    context.visits.complete(a.id).await.unwrap();

    let next = context.visits.next_in_queue(&opd).await.unwrap().unwrap();
    assert_eq!(next.id, b.id);
    assert!(context.visits.next_in_queue(&opd).await.unwrap().is_none());
}
