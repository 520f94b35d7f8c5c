//! Human-readable identifier generation
//!
//! Numbers are minted from an atomic [`CounterStore`] outside any business
//! transaction, so a rolled-back operation leaves a gap in the sequence.
//!
//! | Namespace | Scope         | Format              |
//! |-----------|---------------|---------------------|
//! | patient   | `OPD` / `IPD` | `OPD-000123`        |
//! | visit     | `{DEPT}:{TYPE}` | `ER-OPD-00042`    |
//! | employee  | `{year}`      | `EMP-2024-00005`    |
//!
//! When the store is unreachable and fallback is enabled, a
//! timestamp-derived number (`OPD-T1717171717171` followed by four random
//! digits) is returned instead and flagged as degraded.

use crate::adapters::counter::CounterStore;
use crate::domain::{CaduceusError, CounterKey, CounterNamespace, DepartmentCode, Result, VisitType};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Patient registration type; the scope of patient numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientType {
    Opd,
    Ipd,
}

impl PatientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opd => "OPD",
            Self::Ipd => "IPD",
        }
    }
}

impl fmt::Display for PatientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPD" => Ok(Self::Opd),
            "IPD" => Ok(Self::Ipd),
            _ => Err(format!("Invalid patient type: {s}")),
        }
    }
}

/// A minted identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedNumber {
    pub value: String,
    /// Counter value, absent for fallback numbers
    pub sequence: Option<i64>,
    /// Minted by the timestamp fallback rather than the counter store
    pub degraded: bool,
}

impl fmt::Display for GeneratedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Atomic counter service
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    fallback_enabled: bool,
    degraded: AtomicBool,
}

impl fmt::Debug for CounterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterService")
            .field("backend", &self.store.backend_name())
            .field("fallback_enabled", &self.fallback_enabled)
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>, fallback_enabled: bool) -> Self {
        Self {
            store,
            fallback_enabled,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the most recent attempt fell back to a timestamp number
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Mint the next identifier for `key`
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::Unavailable`] when the store is unreachable
    /// and fallback is disabled, and [`CaduceusError::Database`] for any
    /// other store failure.
    pub async fn generate(&self, key: &CounterKey) -> Result<GeneratedNumber> {
        match self.store.increment(key).await {
            Ok(sequence) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    tracing::info!(
                        backend = self.store.backend_name(),
                        "Counter store recovered"
                    );
                }
                Ok(GeneratedNumber {
                    value: format_number(key, sequence),
                    sequence: Some(sequence),
                    degraded: false,
                })
            }
            Err(CaduceusError::Unavailable(reason)) if self.fallback_enabled => {
                self.degraded.store(true, Ordering::Relaxed);
                let value = fallback_number(key);
                tracing::warn!(
                    counter = %key,
                    backend = self.store.backend_name(),
                    reason = %reason,
                    number = %value,
                    "Counter store unavailable, issued fallback number"
                );
                Ok(GeneratedNumber {
                    value,
                    sequence: None,
                    degraded: true,
                })
            }
            Err(e) => {
                if matches!(e, CaduceusError::Unavailable(_)) {
                    self.degraded.store(true, Ordering::Relaxed);
                }
                tracing::error!(counter = %key, error = %e, "Counter increment failed");
                Err(e)
            }
        }
    }

    pub async fn patient_number(&self, patient_type: PatientType) -> Result<GeneratedNumber> {
        self.generate(&CounterKey::new(CounterNamespace::Patient, patient_type.as_str()))
            .await
    }

    pub async fn visit_number(
        &self,
        department: &DepartmentCode,
        visit_type: VisitType,
    ) -> Result<GeneratedNumber> {
        let scope = format!("{}:{}", department, visit_type.code());
        self.generate(&CounterKey::new(CounterNamespace::Visit, scope))
            .await
    }

    pub async fn employee_number(&self, year: i32) -> Result<GeneratedNumber> {
        self.generate(&CounterKey::new(CounterNamespace::Employee, year.to_string()))
            .await
    }
}

fn prefix(key: &CounterKey) -> String {
    match key.namespace {
        CounterNamespace::Patient => key.scope.clone(),
        CounterNamespace::Visit => key.scope.replace(':', "-"),
        CounterNamespace::Employee => format!("EMP-{}", key.scope),
    }
}

fn format_number(key: &CounterKey, sequence: i64) -> String {
    match key.namespace {
        CounterNamespace::Patient => format!("{}-{:06}", prefix(key), sequence),
        CounterNamespace::Visit | CounterNamespace::Employee => {
            format!("{}-{:05}", prefix(key), sequence)
        }
    }
}

fn fallback_number(key: &CounterKey) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!(
        "{}-T{}{:04}",
        prefix(key),
        Utc::now().timestamp_millis(),
        suffix
    )
}
