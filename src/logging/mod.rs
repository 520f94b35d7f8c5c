//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted logs in a rolling file
//! - Configurable log levels
//! - Helper macros that give ledger log lines consistent field names
//!
//! # Example
//!
//! ```no_run
//! use caduceus::logging::init_logging;
//! use caduceus::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Ledger service started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log a committed ledger mutation
///
/// # Example
///
/// ```no_run
/// use caduceus::log_ledger_mutation;
/// use caduceus::domain::ItemId;
///
/// let item_id = ItemId::new();
/// log_ledger_mutation!("inventory_item", &item_id, "add_stock", delta = "10");
/// ```
#[macro_export]
macro_rules! log_ledger_mutation {
    ($entity:expr, $id:expr, $operation:expr) => {
        tracing::info!(
            entity = $entity,
            entity_id = %$id,
            operation = $operation,
            "Ledger mutation committed"
        );
    };
    ($entity:expr, $id:expr, $operation:expr, $($field:tt)+) => {
        tracing::info!(
            entity = $entity,
            entity_id = %$id,
            operation = $operation,
            $($field)+,
            "Ledger mutation committed"
        );
    };
}

/// Log a rejected operation
///
/// Business rejections are logged at `info`; infrastructure failures at `error`.
///
/// # Example
///
/// ```no_run
/// use caduceus::log_rejection;
/// use caduceus::domain::CaduceusError;
///
/// let error = CaduceusError::InvalidInput("quantity must be positive".to_string());
/// log_rejection!("remove_stock", &error);
/// ```
#[macro_export]
macro_rules! log_rejection {
    ($operation:expr, $error:expr) => {
        if $error.is_rejection() {
            tracing::info!(
                operation = $operation,
                status = $error.status_code(),
                error = %$error,
                "Operation rejected"
            );
        } else {
            tracing::error!(
                operation = $operation,
                status = $error.status_code(),
                error = %$error,
                "Operation failed"
            );
        }
    };
}

/// Log the outcome of an event publish
///
/// # Example
///
/// ```no_run
/// use caduceus::log_event_published;
///
/// log_event_published!("StockUpdated", 2, 0);
/// ```
#[macro_export]
macro_rules! log_event_published {
    ($name:expr, $delivered:expr, $failed:expr) => {
        tracing::debug!(
            event = %$name,
            delivered = $delivered,
            failed = $failed,
            "Event published"
        );
    };
}
