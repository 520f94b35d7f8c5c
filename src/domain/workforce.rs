//! Workforce domain model: employees, attendance and payroll
//!
//! [`ShiftPolicy`] holds the pure rules for lateness and overtime so they can
//! be tested without a store.

use super::ids::{AttendanceId, DepartmentCode, EmployeeId, PayrollId};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub employee_number: String,
    pub name: String,
    pub department: Option<DepartmentCode>,
    pub hourly_rate: Decimal,
    pub degraded_number: bool,
    pub hired_at: DateTime<Utc>,
}

/// Input for employee registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    #[serde(default)]
    pub department: Option<DepartmentCode>,
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub hired_at: Option<DateTime<Utc>>,
}

impl NewEmployee {
    pub fn new(name: impl Into<String>, hourly_rate: Decimal) -> Self {
        Self {
            name: name.into(),
            department: None,
            hourly_rate,
            hired_at: None,
        }
    }

    pub fn in_department(mut self, department: DepartmentCode) -> Self {
        self.department = Some(department);
        self
    }

    pub fn hired_at(mut self, at: DateTime<Utc>) -> Self {
        self.hired_at = Some(at);
        self
    }
}

/// Attendance status for a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Overtime,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "PRESENT"),
            Self::Late => write!(f, "LATE"),
            Self::Overtime => write!(f, "OVERTIME"),
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRESENT" => Ok(Self::Present),
            "LATE" => Ok(Self::Late),
            "OVERTIME" => Ok(Self::Overtime),
            _ => Err(format!("Invalid attendance status: {s}")),
        }
    }
}

/// One shift worked by an employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: AttendanceId,
    pub employee_id: EmployeeId,
    pub shift_date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub overtime_seconds: i64,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }
}

/// Input for payroll processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollRequest {
    pub employee_id: EmployeeId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_pay: Decimal,
    #[serde(default)]
    pub allowances: Decimal,
    #[serde(default)]
    pub deductions: Decimal,
}

/// A processed payroll run for one employee and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payroll {
    pub id: PayrollId,
    pub employee_id: EmployeeId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_pay: Decimal,
    pub overtime_seconds: i64,
    pub overtime_pay: Decimal,
    pub allowances: Decimal,
    pub deductions: Decimal,
    pub net_pay: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Lateness and overtime rules
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftPolicy {
    pub shift_start: NaiveTime,
    pub late_grace: Duration,
    pub standard_shift: Duration,
    pub overtime_multiplier: Decimal,
    /// Offset of the hospital's local clock from UTC
    pub offset: FixedOffset,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self {
            shift_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            late_grace: Duration::minutes(15),
            standard_shift: Duration::hours(8),
            overtime_multiplier: Decimal::new(15, 1),
            offset: Utc.fix(),
        }
    }
}

impl ShiftPolicy {
    /// Local calendar date of a check-in
    pub fn shift_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// PRESENT or LATE depending on the local check-in time
    pub fn arrival_status(&self, at: DateTime<Utc>) -> AttendanceStatus {
        let local = at.with_timezone(&self.offset);
        let (cutoff, wrapped) = self.shift_start.overflowing_add_signed(self.late_grace);
        // Grace periods that wrap past midnight never mark anyone late.
        if wrapped != 0 {
            return AttendanceStatus::Present;
        }
        if local.time() > cutoff {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    /// Seconds worked beyond the standard shift, never negative
    pub fn overtime_seconds(&self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
        let worked = check_out - check_in;
        (worked - self.standard_shift).num_seconds().max(0)
    }

    /// `hours × hourly_rate × multiplier`
    pub fn overtime_pay(&self, overtime_seconds: i64, hourly_rate: Decimal) -> Decimal {
        let hours = Decimal::from(overtime_seconds) / Decimal::from(3600);
        (hours * hourly_rate * self.overtime_multiplier).round_dp(2)
    }
}
