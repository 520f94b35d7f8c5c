// Caduceus - Hospital ledger and numbering core
// Copyright (c) 2025 Caduceus Contributors
// Licensed under the MIT License

//! # Caduceus - hospital ledger core
//!
//! Caduceus is the transactional core of a hospital management system: the
//! parts where money, stock and identity must stay consistent under
//! concurrent access.
//!
//! ## Overview
//!
//! This library provides:
//! - **Numbering**: gap-tolerant sequential identifiers (`OPD-000123`,
//!   `ER-EMR-00042`, `EMP-2024-00007`) from an atomic counter store, with a
//!   flagged timestamp fallback when the store is down
//! - **Stock ledger**: add, remove, transfer and reconcile inventory with an
//!   append-only movement log
//! - **Billing ledger**: invoices, partial payments, cancellations and
//!   insurance claims, with overpayment rejected under a row lock
//! - **Visits**: one open visit per patient and department, FIFO department
//!   queues
//! - **Workforce**: attendance with lateness and overtime, payroll
//! - **Events**: an in-process publish/subscribe bus, optionally broadcast
//!   to other instances over Redis
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Ledger services, numbering and the event bus
//! - [`adapters`] - Stores (in-memory, PostgreSQL), counters, event channels
//! - [`domain`] - Domain types, events and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use caduceus::config::CaduceusConfig;
//! use caduceus::core::context::LedgerContext;
//! use caduceus::domain::{Department, DepartmentCode, NewVisit, PatientId, VisitType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = LedgerContext::from_config(&CaduceusConfig::default()).await?;
//!
//!     let er = DepartmentCode::new("ER")?;
//!     context
//!         .stock
//!         .register_department(Department::new(er.clone(), "Emergency"))
//!         .await?;
//!
//!     let visit = context
//!         .visits
//!         .create(NewVisit::new(PatientId::new("P-1")?, er.clone(), VisitType::Emergency))
//!         .await?;
//!     println!("Queued {}", visit.visit_number);
//!
//!     let next = context.visits.next_in_queue(&er).await?;
//!     println!("Now serving {:?}", next.map(|v| v.visit_number));
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`]. Business rule
//! violations surface as [`domain::CaduceusError::PreconditionFailed`] with a
//! [`domain::Precondition`] describing what was refused:
//!
//! ```rust,no_run
//! use caduceus::domain::{CaduceusError, Precondition};
//!
//! fn describe(err: &CaduceusError) -> String {
//!     match err.precondition() {
//!         Some(Precondition::Overpayment { paid, total, .. }) => {
//!             format!("only {} is outstanding", *total - *paid)
//!         }
//!         _ => format!("{err} (HTTP {})", err.status_code()),
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! Caduceus logs with `tracing`. Ledger mutations carry the entity id and
//! operation as structured fields, and published events can be mirrored to
//! the `caduceus::audit` target.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
