//! Core business logic for Caduceus.
//!
//! This module contains the ledger services and the infrastructure they share.
//!
//! # Modules
//!
//! - [`events`] - In-process event bus with optional external broadcast
//! - [`numbering`] - Human-readable identifiers from atomic counters
//! - [`inventory`] - Stock ledger (add, remove, transfer, reconcile)
//! - [`billing`] - Invoices, payments and insurance claims
//! - [`visits`] - Visit lifecycle and department queues
//! - [`workforce`] - Employees, attendance and payroll
//! - [`audit`] - Audit rows and the audit log subscriber
//! - [`context`] - Wires every service from configuration
//!
//! # Operation Workflow
//!
//! Every state-changing operation follows the same steps:
//!
//! 1. **Validate**: Reject malformed input before touching the store
//! 2. **Lock**: Take the row/key locks for the entities involved
//! 3. **Mutate**: Apply the change and append the movement or payment record
//! 4. **Audit**: Insert one audit row per event that will be published
//! 5. **Commit**: Make everything visible at once
//! 6. **Publish**: Hand the events to the bus
//!
//! A rejection at any step before commit rolls the whole transaction back.
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus::config::load_config;
//! use caduceus::core::context::LedgerContext;
//! use caduceus::domain::NewInventoryItem;
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("caduceus.toml")?;
//! let context = LedgerContext::from_config(&config).await?;
//!
//! let item = context
//!     .stock
//!     .register_item(NewInventoryItem::new("Gauze 10cm", Decimal::from(5)), "storekeeper")
//!     .await?;
//! let change = context
//!     .stock
//!     .add_stock(item.id, Decimal::from(10), "delivery", "storekeeper")
//!     .await?;
//!
//! println!("{} -> {}", change.old_quantity, change.item.quantity);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod billing;
pub mod context;
pub mod events;
pub mod inventory;
pub mod numbering;
pub mod visits;
pub mod workforce;

use crate::adapters::database::LedgerTransaction;
use crate::domain::{CaduceusError, Result};

/// Commit on success, roll back on failure
///
/// Failures are logged once here with the operation name, so callers only
/// need `?`.
pub(crate) async fn finish<T>(
    tx: Box<dyn LedgerTransaction>,
    operation: &'static str,
    outcome: Result<T>,
) -> Result<T> {
    match outcome {
        Ok(value) => match tx.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                crate::log_rejection!(operation, &e);
                Err(e)
            }
        },
        Err(e) => {
            discard(tx, operation).await;
            crate::log_rejection!(operation, &e);
            Err(e)
        }
    }
}

/// End a read-only transaction
///
/// Read failures are returned without rejection logging.
pub(crate) async fn finish_read<T>(
    tx: Box<dyn LedgerTransaction>,
    operation: &'static str,
    outcome: Result<T>,
) -> Result<T> {
    discard(tx, operation).await;
    outcome
}

async fn discard(tx: Box<dyn LedgerTransaction>, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(operation, error = %e, "Rollback failed");
    }
}

/// Log an input rejection raised before any store access
pub(crate) fn rejected(operation: &'static str, error: CaduceusError) -> CaduceusError {
    crate::log_rejection!(operation, &error);
    error
}

/// Reject blank free-text fields
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CaduceusError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::{InventoryTx, LedgerStore};
    use crate::adapters::memory::MemoryLedgerStore;
    use crate::domain::{Department, DepartmentCode};

    fn pharmacy() -> Department {
        Department::new(DepartmentCode::new("PHARM").unwrap(), "Pharmacy")
    }

    #[tokio::test]
    async fn test_finish_commits_on_success() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        let outcome = tx.upsert_department(&pharmacy()).await;
        finish(tx, "register_department", outcome).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.department(&pharmacy().code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_finish_rolls_back_on_error() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_department(&pharmacy()).await.unwrap();
        let outcome: Result<()> = Err(CaduceusError::InvalidInput("nope".to_string()));
        assert!(finish(tx, "register_department", outcome).await.is_err());

        let mut tx = store.begin().await.unwrap();
        assert!(tx.department(&pharmacy().code).await.unwrap().is_none());
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("reason", "restock").is_ok());
        assert!(matches!(
            require_text("reason", "  "),
            Err(CaduceusError::InvalidInput(_))
        ));
    }
}
