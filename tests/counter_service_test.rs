//! Integration tests for sequential numbering and its fallback

use async_trait::async_trait;
use caduceus::adapters::counter::{CounterStore, MemoryCounterStore};
use caduceus::core::numbering::{CounterService, PatientType};
use caduceus::domain::{
    CaduceusError, CounterKey, CounterNamespace, DepartmentCode, Result, VisitType,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use test_case::test_case;

/// Memory counters behind a switch that simulates an outage
struct SwitchableStore {
    inner: MemoryCounterStore,
    down: AtomicBool,
    failure: fn() -> CaduceusError,
}

impl SwitchableStore {
    fn new(failure: fn() -> CaduceusError) -> Self {
        Self {
            inner: MemoryCounterStore::new(),
            down: AtomicBool::new(false),
            failure,
        }
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl CounterStore for SwitchableStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        if self.down.load(Ordering::SeqCst) {
            return Err((self.failure)());
        }
        self.inner.increment(key).await
    }

    fn backend_name(&self) -> &'static str {
        "switchable"
    }
}

fn unreachable() -> CaduceusError {
    CaduceusError::Unavailable("connection refused".to_string())
}

fn broken() -> CaduceusError {
    CaduceusError::Database("WRONGTYPE Operation against a key".to_string())
}

#[test_case(PatientType::Opd, "OPD-000001"; "outpatient")]
#[test_case(PatientType::Ipd, "IPD-000001"; "inpatient")]
#[tokio::test]
async fn test_first_patient_number(patient_type: PatientType, expected: &str) {
    let service = CounterService::new(Arc::new(MemoryCounterStore::new()), true);
    let number = service.patient_number(patient_type).await.unwrap();
    assert_eq!(number.value, expected);
    assert_eq!(number.sequence, Some(1));
    assert!(!number.degraded);
}

#[tokio::test]
async fn test_visit_and_employee_scopes_are_independent() {
    let service = CounterService::new(Arc::new(MemoryCounterStore::new()), true);
    let er = DepartmentCode::new("ER").unwrap();
    let opd = DepartmentCode::new("OPD").unwrap();

    service.visit_number(&er, VisitType::Emergency).await.unwrap();
    let second = service.visit_number(&er, VisitType::Emergency).await.unwrap();
    let other = service.visit_number(&opd, VisitType::Opd).await.unwrap();
    assert_eq!(second.value, "ER-EMR-00002");
    assert_eq!(other.value, "OPD-OPD-00001");

    assert_eq!(
        service.employee_number(2024).await.unwrap().value,
        "EMP-2024-00001"
    );
    assert_eq!(
        service.employee_number(2025).await.unwrap().value,
        "EMP-2025-00001"
    );
}

#[tokio::test]
async fn test_outage_falls_back_to_degraded_numbers() {
    let store = Arc::new(SwitchableStore::new(unreachable));
    let service = CounterService::new(Arc::clone(&store) as Arc<dyn CounterStore>, true);

    let first = service.patient_number(PatientType::Opd).await.unwrap();
    assert_eq!(first.value, "OPD-000001");

    store.set_down(true);
    let fallback = service.patient_number(PatientType::Opd).await.unwrap();
    assert!(fallback.degraded);
    assert!(fallback.sequence.is_none());
    assert!(fallback.value.starts_with("OPD-T"));
    assert!(service.is_degraded());

    store.set_down(false);
    let recovered = service.patient_number(PatientType::Opd).await.unwrap();
    assert_eq!(recovered.value, "OPD-000002");
    assert!(!service.is_degraded());
}

#[tokio::test]
async fn test_outage_without_fallback_is_unavailable() {
    let store = Arc::new(SwitchableStore::new(unreachable));
    store.set_down(true);
    let service = CounterService::new(store, false);

    let err = service.patient_number(PatientType::Ipd).await.unwrap_err();
    assert!(matches!(err, CaduceusError::Unavailable(_)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_store_errors_never_fall_back() {
    let store = Arc::new(SwitchableStore::new(broken));
    store.set_down(true);
    let service = CounterService::new(store, true);

    let err = service.employee_number(2024).await.unwrap_err();
    assert!(matches!(err, CaduceusError::Database(_)));
    assert!(!service.is_degraded());
}

#[tokio::test]
async fn test_concurrent_numbers_are_unique_and_dense() {
    let service = Arc::new(CounterService::new(Arc::new(MemoryCounterStore::new()), true));
    let key = CounterKey::new(CounterNamespace::Visit, "ER:EMR");

    let mut handles = Vec::new();
    for _ in 0..200 {
        let service = Arc::clone(&service);
        let key = key.clone();
        handles.push(tokio::spawn(async move { service.generate(&key).await }));
    }

    let mut sequences = HashSet::new();
    for handle in handles {
        let number = handle.await.unwrap().unwrap();
        assert!(sequences.insert(number.sequence.unwrap()));
    }
    assert_eq!(sequences.len(), 200);
    assert_eq!(sequences.iter().max(), Some(&200));
}
