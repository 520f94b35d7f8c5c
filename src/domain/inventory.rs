//! Inventory domain model
//!
//! Items carry an exact decimal quantity that is only ever changed through
//! the stock ledger. Every change appends a [`StockMovement`] whose signed
//! delta is the authoritative record of what happened.

use super::ids::{DepartmentCode, ItemId, MovementId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hospital department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub code: DepartmentCode,
    pub name: String,
}

impl Department {
    pub fn new(code: DepartmentCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

/// A stocked inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub sku: Option<String>,
    pub batch: Option<String>,
    pub expiry: Option<NaiveDate>,
    /// Current balance, never negative
    pub quantity: Decimal,
    /// Balance at creation; `quantity == initial_quantity + Σ movement deltas`
    pub initial_quantity: Decimal,
    pub department: Option<DepartmentCode>,
    /// Linked catalog (drug/consumable master) entry
    pub catalog_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Whether this item occupies the `(name, batch, department)` slot
    pub fn matches_slot(&self, name: &str, batch: Option<&str>, department: &DepartmentCode) -> bool {
        self.name == name
            && self.batch.as_deref() == batch
            && self.department.as_ref() == Some(department)
    }

    /// Builds the destination copy of `self` for a transfer into `department`
    pub fn split_into(&self, department: DepartmentCode, quantity: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            name: self.name.clone(),
            sku: self.sku.clone(),
            batch: self.batch.clone(),
            expiry: self.expiry,
            quantity,
            initial_quantity: Decimal::ZERO,
            department: Some(department),
            catalog_ref: self.catalog_ref.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for registering a new item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    pub quantity: Decimal,
    #[serde(default)]
    pub department: Option<DepartmentCode>,
    #[serde(default)]
    pub catalog_ref: Option<String>,
}

impl NewInventoryItem {
    pub fn new(name: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            sku: None,
            batch: None,
            expiry: None,
            quantity,
            department: None,
            catalog_ref: None,
        }
    }

    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = Some(batch.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn in_department(mut self, department: DepartmentCode) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_catalog_ref(mut self, catalog_ref: impl Into<String>) -> Self {
        self.catalog_ref = Some(catalog_ref.into());
        self
    }
}

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Add,
    Remove,
    Transfer,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "ADD"),
            Self::Remove => write!(f, "REMOVE"),
            Self::Transfer => write!(f, "TRANSFER"),
        }
    }
}

impl FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Self::Add),
            "REMOVE" => Ok(Self::Remove),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(format!("Invalid movement type: {s}")),
        }
    }
}

/// Immutable ledger entry for one quantity change of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub from_department: Option<DepartmentCode>,
    pub to_department: Option<DepartmentCode>,
    /// Signed change applied to `item_id`
    pub delta: Decimal,
    pub movement_type: MovementType,
    pub reason: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Result of checking an item's balance against its movement trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockReconciliation {
    pub item_id: ItemId,
    pub quantity: Decimal,
    pub initial_quantity: Decimal,
    pub movement_total: Decimal,
}

impl StockReconciliation {
    /// `quantity == initial + Σ delta`
    pub fn is_consistent(&self) -> bool {
        self.quantity == self.initial_quantity + self.movement_total
    }

    /// Amount by which the stored balance differs from the movement trail
    pub fn drift(&self) -> Decimal {
        self.quantity - (self.initial_quantity + self.movement_total)
    }
}
