//! Visit and queue domain model

use super::ids::{DepartmentCode, PatientId, VisitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visit lifecycle state
///
/// `Queued -> Active -> Completed`, with `Queued -> Completed` allowed for
/// patients who leave before being seen. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Queued,
    Active,
    Completed,
}

impl VisitStatus {
    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Active)
                | (Self::Queued, Self::Completed)
                | (Self::Active, Self::Completed)
        )
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid visit status: {s}")),
        }
    }
}

/// Kind of visit; part of the visit number scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Opd,
    Ipd,
    Emergency,
    FollowUp,
}

impl VisitType {
    /// Short code used in visit numbers (`ER-OPD-00042`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Opd => "OPD",
            Self::Ipd => "IPD",
            Self::Emergency => "EMR",
            Self::FollowUp => "FUP",
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VisitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPD" => Ok(Self::Opd),
            "IPD" => Ok(Self::Ipd),
            "EMR" | "EMERGENCY" => Ok(Self::Emergency),
            "FUP" | "FOLLOW_UP" => Ok(Self::FollowUp),
            _ => Err(format!("Invalid visit type: {s}")),
        }
    }
}

/// A patient visit to a department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub visit_number: String,
    pub patient_id: PatientId,
    pub department: DepartmentCode,
    pub visit_type: VisitType,
    pub status: VisitStatus,
    /// Set when the visit number came from the fallback generator
    pub degraded_number: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for visit creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVisit {
    pub patient_id: PatientId,
    pub department: DepartmentCode,
    pub visit_type: VisitType,
}

impl NewVisit {
    pub fn new(patient_id: PatientId, department: DepartmentCode, visit_type: VisitType) -> Self {
        Self {
            patient_id,
            department,
            visit_type,
        }
    }
}

/// A waiting visit in a department queue
///
/// Ordered by `(enqueued_at, sequence)`; the sequence breaks ties between
/// entries enqueued within the same clock tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub visit_id: VisitId,
    pub department: DepartmentCode,
    pub enqueued_at: DateTime<Utc>,
    pub sequence: i64,
}

impl QueueEntry {
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.enqueued_at, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(VisitStatus::Queued, VisitStatus::Active => true)]
    #[test_case(VisitStatus::Queued, VisitStatus::Completed => true)]
    #[test_case(VisitStatus::Active, VisitStatus::Completed => true)]
    #[test_case(VisitStatus::Active, VisitStatus::Queued => false)]
    #[test_case(VisitStatus::Completed, VisitStatus::Active => false)]
    #[test_case(VisitStatus::Completed, VisitStatus::Completed => false)]
    fn test_transitions(from: VisitStatus, to: VisitStatus) -> bool {
        from.can_transition_to(to)
    }

    #[test]
    fn test_visit_type_codes() {
        assert_eq!(VisitType::Emergency.code(), "EMR");
        assert_eq!("emergency".parse::<VisitType>().unwrap(), VisitType::Emergency);
        assert_eq!("opd".parse::<VisitType>().unwrap(), VisitType::Opd);
        assert!("walk-in".parse::<VisitType>().is_err());
    }

    #[test]
    fn test_queue_order_key_breaks_ties_by_sequence() {
        let now = Utc::now();
        let dept = DepartmentCode::new("OPD").unwrap();
        let a = QueueEntry {
            visit_id: VisitId::new(),
            department: dept.clone(),
            enqueued_at: now,
            sequence: 1,
        };
        let b = QueueEntry {
            visit_id: VisitId::new(),
            department: dept,
            enqueued_at: now,
            sequence: 2,
        };
        assert!(a.order_key() < b.order_key());
    }
}
