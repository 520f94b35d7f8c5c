//! Employees, attendance and payroll
//!
//! Lateness and overtime follow the configured [`ShiftPolicy`]. Shift dates
//! are local calendar dates, so an employee gets one open attendance per
//! local day regardless of where midnight UTC falls.

use super::audit;
use super::events::EventBus;
use super::numbering::CounterService;
use super::{finish, rejected, require_text};
use crate::adapters::database::{InventoryTx, LedgerStore, LedgerTransaction, WorkforceTx};
use crate::domain::events::{EmployeeCheckedIn, EmployeeOvertime, PayrollProcessed};
use crate::domain::{
    Attendance, AttendanceId, AttendanceStatus, CaduceusError, DomainEvent, Employee, EmployeeId,
    NewEmployee, Payroll, PayrollId, PayrollRequest, Precondition, Result, ShiftPolicy,
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Workforce service over a transactional store
pub struct WorkforceService {
    store: Arc<dyn LedgerStore>,
    counters: Arc<CounterService>,
    bus: Arc<EventBus>,
    policy: ShiftPolicy,
}

impl WorkforceService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        counters: Arc<CounterService>,
        bus: Arc<EventBus>,
        policy: ShiftPolicy,
    ) -> Self {
        Self {
            store,
            counters,
            bus,
            policy,
        }
    }

    pub fn policy(&self) -> &ShiftPolicy {
        &self.policy
    }

    /// Register an employee and mint their `EMP-{year}-NNNNN` number
    ///
    /// The year is the local hire year.
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] for a blank name or negative hourly rate
    /// - [`CaduceusError::NotFound`] if the department does not exist
    pub async fn register_employee(&self, request: NewEmployee) -> Result<Employee> {
        validate_employee(&request).map_err(|e| rejected("register_employee", e))?;

        let hired_at = request.hired_at.unwrap_or_else(Utc::now);
        let year = hired_at.with_timezone(&self.policy.offset).year();
        let number = self.counters.employee_number(year).await?;

        let employee = Employee {
            id: EmployeeId::new(),
            employee_number: number.value,
            name: request.name.trim().to_string(),
            department: request.department,
            hourly_rate: request.hourly_rate,
            degraded_number: number.degraded,
            hired_at,
        };

        let mut tx = self.store.begin().await?;
        let outcome = async {
            if let Some(department) = &employee.department {
                if tx.department(department).await?.is_none() {
                    return Err(CaduceusError::not_found("department", department));
                }
            }
            tx.insert_employee(&employee).await?;
            audit::record(
                &mut *tx,
                "EmployeeRegistered",
                serde_json::to_value(&employee)?,
                None,
            )
            .await
        }
        .await;
        finish(tx, "register_employee", outcome).await?;

        crate::log_ledger_mutation!(
            "employee",
            &employee.id,
            "register_employee",
            employee_number = %employee.employee_number,
            degraded_number = employee.degraded_number
        );
        Ok(employee)
    }

    /// Open the employee's attendance for the local shift date of `at`
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::NotFound`] if the employee does not exist
    /// - [`Precondition::AlreadyCheckedIn`] if an attendance for that shift
    ///   date is still open
    pub async fn check_in(&self, employee_id: EmployeeId, at: DateTime<Utc>) -> Result<Attendance> {
        let shift_date = self.policy.shift_date(at);
        let status = self.policy.arrival_status(at);

        let mut tx = self.store.begin().await?;
        let outcome = async {
            lock_employee(&mut *tx, employee_id).await?;

            let today = tx.attendance_on(employee_id, shift_date).await?;
            if today.iter().any(Attendance::is_open) {
                return Err(Precondition::AlreadyCheckedIn {
                    employee_id: employee_id.to_string(),
                    shift_date,
                }
                .into());
            }

            let attendance = Attendance {
                id: AttendanceId::new(),
                employee_id,
                shift_date,
                check_in: at,
                check_out: None,
                status,
                overtime_seconds: 0,
            };
            tx.insert_attendance(&attendance).await?;

            let event = DomainEvent::EmployeeCheckedIn(EmployeeCheckedIn {
                employee_id,
                attendance_id: attendance.id,
                check_in: at,
                shift_date,
                status,
            });
            audit::record_event(&mut *tx, &event, None).await?;
            Ok::<_, CaduceusError>((attendance, event))
        }
        .await;
        let (attendance, event) = finish(tx, "check_in", outcome).await?;

        crate::log_ledger_mutation!(
            "employee",
            &employee_id,
            "check_in",
            shift_date = %shift_date,
            status = %status
        );
        self.bus.publish(event);
        Ok(attendance)
    }

    /// Close the employee's open attendance and compute overtime
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::NotFound`] if the employee does not exist
    /// - [`Precondition::NotCheckedIn`] without an open attendance
    /// - [`CaduceusError::InvalidInput`] if `at` is before the check-in
    pub async fn check_out(&self, employee_id: EmployeeId, at: DateTime<Utc>) -> Result<Attendance> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            lock_employee(&mut *tx, employee_id).await?;

            let mut attendance = tx
                .open_attendance(employee_id)
                .await?
                .ok_or_else(|| Precondition::NotCheckedIn(employee_id.to_string()))?;
            if at < attendance.check_in {
                return Err(CaduceusError::InvalidInput(format!(
                    "check-out {at} is before check-in {}",
                    attendance.check_in
                )));
            }

            let overtime_seconds = self.policy.overtime_seconds(attendance.check_in, at);
            attendance.check_out = Some(at);
            attendance.overtime_seconds = overtime_seconds;
            if overtime_seconds > 0 {
                attendance.status = AttendanceStatus::Overtime;
            }
            tx.update_attendance(&attendance).await?;

            let event = (overtime_seconds > 0).then(|| {
                DomainEvent::EmployeeOvertime(EmployeeOvertime {
                    employee_id,
                    attendance_id: attendance.id,
                    overtime_seconds,
                    date: attendance.shift_date,
                })
            });
            match &event {
                Some(event) => audit::record_event(&mut *tx, event, None).await?,
                None => {
                    audit::record(
                        &mut *tx,
                        "EmployeeCheckedOut",
                        serde_json::to_value(&attendance)?,
                        None,
                    )
                    .await?
                }
            }
            Ok::<_, CaduceusError>((attendance, event))
        }
        .await;
        let (attendance, event) = finish(tx, "check_out", outcome).await?;

        crate::log_ledger_mutation!(
            "employee",
            &employee_id,
            "check_out",
            overtime_seconds = attendance.overtime_seconds,
            status = %attendance.status
        );
        if let Some(event) = event {
            self.bus.publish(event);
        }
        Ok(attendance)
    }

    /// Compute and record pay for one employee and period
    ///
    /// Overtime is summed over attendance whose shift date falls in
    /// `[period_start, period_end]`.
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] for an inverted period, negative
    ///   amounts, or a negative net pay
    /// - [`CaduceusError::NotFound`] if the employee does not exist
    /// - [`Precondition::PayrollAlreadyProcessed`] for a repeated period start
    pub async fn process_payroll(&self, request: PayrollRequest) -> Result<Payroll> {
        validate_payroll(&request).map_err(|e| rejected("process_payroll", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = self.process_payroll_tx(&mut *tx, &request).await;
        let (payroll, event) = finish(tx, "process_payroll", outcome).await?;

        crate::log_ledger_mutation!(
            "employee",
            &payroll.employee_id,
            "process_payroll",
            payroll_id = %payroll.id,
            period_start = %payroll.period_start,
            net_pay = %payroll.net_pay
        );
        self.bus.publish(event);
        Ok(payroll)
    }

    async fn process_payroll_tx(
        &self,
        tx: &mut dyn LedgerTransaction,
        request: &PayrollRequest,
    ) -> Result<(Payroll, DomainEvent)> {
        let employee = lock_employee(tx, request.employee_id).await?;

        if tx
            .payroll_exists(request.employee_id, request.period_start)
            .await?
        {
            return Err(Precondition::PayrollAlreadyProcessed {
                employee_id: request.employee_id.to_string(),
                period_start: request.period_start,
            }
            .into());
        }

        let overtime_seconds = tx
            .sum_overtime_seconds(request.employee_id, request.period_start, request.period_end)
            .await?;
        let overtime_pay = self
            .policy
            .overtime_pay(overtime_seconds, employee.hourly_rate);
        let net_pay = request.base_pay + overtime_pay + request.allowances - request.deductions;
        if net_pay < Decimal::ZERO {
            return Err(CaduceusError::InvalidInput(format!(
                "deductions {} exceed gross pay {}",
                request.deductions,
                request.base_pay + overtime_pay + request.allowances
            )));
        }

        let payroll = Payroll {
            id: PayrollId::new(),
            employee_id: request.employee_id,
            period_start: request.period_start,
            period_end: request.period_end,
            base_pay: request.base_pay,
            overtime_seconds,
            overtime_pay,
            allowances: request.allowances,
            deductions: request.deductions,
            net_pay,
            processed_at: Utc::now(),
        };
        tx.insert_payroll(&payroll).await?;

        let event = DomainEvent::PayrollProcessed(PayrollProcessed {
            payroll_id: payroll.id,
            employee_id: payroll.employee_id,
            period_start: payroll.period_start,
            period_end: payroll.period_end,
            net_pay,
        });
        audit::record_event(tx, &event, None).await?;
        Ok((payroll, event))
    }
}

async fn lock_employee(tx: &mut dyn LedgerTransaction, employee_id: EmployeeId) -> Result<Employee> {
    tx.lock_employee(employee_id)
        .await?
        .ok_or_else(|| CaduceusError::not_found("employee", employee_id))
}

fn validate_employee(request: &NewEmployee) -> Result<()> {
    require_text("employee name", &request.name)?;
    if request.hourly_rate < Decimal::ZERO {
        return Err(CaduceusError::InvalidInput(format!(
            "hourly rate cannot be negative, got {}",
            request.hourly_rate
        )));
    }
    Ok(())
}

fn validate_payroll(request: &PayrollRequest) -> Result<()> {
    if request.period_end < request.period_start {
        return Err(CaduceusError::InvalidInput(format!(
            "payroll period ends {} before it starts {}",
            request.period_end, request.period_start
        )));
    }
    for (field, amount) in [
        ("base pay", request.base_pay),
        ("allowances", request.allowances),
        ("deductions", request.deductions),
    ] {
        if amount < Decimal::ZERO {
            return Err(CaduceusError::InvalidInput(format!(
                "{field} cannot be negative, got {amount}"
            )));
        }
    }
    Ok(())
}
