//! Stock ledger
//!
//! Every quantity change runs in one transaction that locks the item row,
//! writes the new balance, appends a [`StockMovement`] and inserts the audit
//! rows for the events it will publish. Events go out only after commit.
//!
//! Balances never go negative and always satisfy
//! `quantity == initial_quantity + Σ movement.delta`; [`StockLedger::reconcile`]
//! checks the latter against the store's aggregate.

use super::audit;
use super::events::EventBus;
use super::{finish, finish_read, rejected, require_text};
use crate::adapters::database::{InventoryTx, LedgerStore, LedgerTransaction};
use crate::domain::events::{StockLowAlert, StockUpdated};
use crate::domain::{
    CaduceusError, Department, DepartmentCode, DomainEvent, InventoryItem, ItemId, MovementId,
    MovementType, NewInventoryItem, Precondition, Result, StockMovement, StockReconciliation,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one balance change on one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockChange {
    /// Item as committed
    pub item: InventoryItem,
    pub old_quantity: Decimal,
    pub movement: StockMovement,
}

impl StockChange {
    pub fn new_quantity(&self) -> Decimal {
        self.item.quantity
    }
}

/// Outcome of a transfer: the debited source and the credited destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockTransfer {
    pub source: StockChange,
    pub destination: StockChange,
    /// Whether the destination item was created by this transfer
    pub destination_created: bool,
}

/// Inventory service over a transactional store
pub struct StockLedger {
    store: Arc<dyn LedgerStore>,
    bus: Arc<EventBus>,
    low_stock_threshold: Decimal,
}

impl StockLedger {
    pub fn new(store: Arc<dyn LedgerStore>, bus: Arc<EventBus>, low_stock_threshold: Decimal) -> Self {
        Self {
            store,
            bus,
            low_stock_threshold,
        }
    }

    pub fn low_stock_threshold(&self) -> Decimal {
        self.low_stock_threshold
    }

    /// Create or rename a department
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::InvalidInput`] for a blank name
    pub async fn register_department(&self, department: Department) -> Result<Department> {
        require_text("department name", &department.name)
            .map_err(|e| rejected("register_department", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            tx.upsert_department(&department).await?;
            audit::record(
                &mut *tx,
                "DepartmentRegistered",
                serde_json::to_value(&department)?,
                None,
            )
            .await
        }
        .await;
        finish(tx, "register_department", outcome).await?;

        crate::log_ledger_mutation!("department", &department.code, "register_department");
        Ok(department)
    }

    /// Register a new item with its opening balance
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] for a blank name, a negative opening
    ///   quantity, or a `(name, batch, department)` slot that is already taken
    /// - [`CaduceusError::NotFound`] if the department does not exist
    pub async fn register_item(&self, request: NewInventoryItem, actor: &str) -> Result<InventoryItem> {
        validate_new_item(&request, actor).map_err(|e| rejected("register_item", e))?;

        let now = Utc::now();
        let item = InventoryItem {
            id: ItemId::new(),
            name: request.name.trim().to_string(),
            sku: request.sku,
            batch: request.batch,
            expiry: request.expiry,
            quantity: request.quantity,
            initial_quantity: request.quantity,
            department: request.department,
            catalog_ref: request.catalog_ref,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        let outcome = register_item_tx(&mut *tx, &item, actor).await;
        finish(tx, "register_item", outcome).await?;

        crate::log_ledger_mutation!(
            "inventory_item",
            &item.id,
            "register_item",
            quantity = %item.quantity,
            department = ?item.department.as_ref().map(DepartmentCode::as_str)
        );
        Ok(item)
    }

    /// Increase an item's balance
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] if `quantity <= 0`
    /// - [`CaduceusError::NotFound`] if the item does not exist
    pub async fn add_stock(
        &self,
        item_id: ItemId,
        quantity: Decimal,
        reason: &str,
        actor: &str,
    ) -> Result<StockChange> {
        validate_movement(quantity, reason, actor).map_err(|e| rejected("add_stock", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let item = lock_existing(&mut *tx, item_id).await?;
            let movement = StockMovement {
                id: MovementId::new(),
                item_id,
                from_department: None,
                to_department: item.department.clone(),
                delta: quantity,
                movement_type: MovementType::Add,
                reason: reason.to_string(),
                actor: actor.to_string(),
                created_at: Utc::now(),
            };
            let change = apply(&mut *tx, item, movement).await?;
            let events = self.events_for(&change);
            record_events(&mut *tx, &events, actor).await?;
            Ok::<_, CaduceusError>((change, events))
        }
        .await;
        let (change, events) = finish(tx, "add_stock", outcome).await?;

        crate::log_ledger_mutation!(
            "inventory_item",
            &item_id,
            "add_stock",
            delta = %quantity,
            quantity = %change.item.quantity
        );
        self.publish(events);
        Ok(change)
    }

    /// Decrease an item's balance
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] if `quantity <= 0`
    /// - [`CaduceusError::NotFound`] if the item does not exist
    /// - [`Precondition::InsufficientStock`] if the balance is below `quantity`
    pub async fn remove_stock(
        &self,
        item_id: ItemId,
        quantity: Decimal,
        reason: &str,
        actor: &str,
    ) -> Result<StockChange> {
        validate_movement(quantity, reason, actor).map_err(|e| rejected("remove_stock", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let item = lock_existing(&mut *tx, item_id).await?;
            let movement = StockMovement {
                id: MovementId::new(),
                item_id,
                from_department: item.department.clone(),
                to_department: None,
                delta: -quantity,
                movement_type: MovementType::Remove,
                reason: reason.to_string(),
                actor: actor.to_string(),
                created_at: Utc::now(),
            };
            let change = apply(&mut *tx, item, movement).await?;
            let events = self.events_for(&change);
            record_events(&mut *tx, &events, actor).await?;
            Ok::<_, CaduceusError>((change, events))
        }
        .await;
        let (change, events) = finish(tx, "remove_stock", outcome).await?;

        crate::log_ledger_mutation!(
            "inventory_item",
            &item_id,
            "remove_stock",
            delta = %(-quantity),
            quantity = %change.item.quantity
        );
        self.publish(events);
        Ok(change)
    }

    /// Move stock from an item to the matching item in another department
    ///
    /// The destination is the item with the same name and batch in
    /// `to_department`; it is created with a zero opening balance when the
    /// slot is empty. Both sides get a TRANSFER movement.
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] if `quantity <= 0` or the item
    ///   already belongs to `to_department`
    /// - [`CaduceusError::NotFound`] if the item or department does not exist
    /// - [`Precondition::InsufficientStock`] if the balance is below `quantity`
    pub async fn transfer_stock(
        &self,
        item_id: ItemId,
        quantity: Decimal,
        to_department: &DepartmentCode,
        reason: &str,
        actor: &str,
    ) -> Result<StockTransfer> {
        validate_movement(quantity, reason, actor).map_err(|e| rejected("transfer_stock", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .transfer_tx(&mut *tx, item_id, quantity, to_department, reason, actor)
            .await;
        let (transfer, events) = finish(tx, "transfer_stock", outcome).await?;

        crate::log_ledger_mutation!(
            "inventory_item",
            &item_id,
            "transfer_stock",
            quantity = %quantity,
            destination_item = %transfer.destination.item.id,
            to_department = %to_department
        );
        self.publish(events);
        Ok(transfer)
    }

    async fn transfer_tx(
        &self,
        tx: &mut dyn LedgerTransaction,
        item_id: ItemId,
        quantity: Decimal,
        to_department: &DepartmentCode,
        reason: &str,
        actor: &str,
    ) -> Result<(StockTransfer, Vec<DomainEvent>)> {
        let source = lock_existing(tx, item_id).await?;

        if source.department.as_ref() == Some(to_department) {
            return Err(CaduceusError::InvalidInput(format!(
                "item {item_id} already belongs to department {to_department}"
            )));
        }
        if tx.department(to_department).await?.is_none() {
            return Err(CaduceusError::not_found("department", to_department));
        }
        if source.quantity < quantity {
            return Err(insufficient(&source, quantity));
        }

        let (destination, destination_created) = match tx
            .lock_item_slot(&source.name, source.batch.as_deref(), to_department)
            .await?
        {
            Some(existing) => (existing, false),
            None => {
                let created = source.split_into(to_department.clone(), Decimal::ZERO);
                tx.insert_item(&created).await?;
                (created, true)
            }
        };

        let now = Utc::now();
        let from_department = source.department.clone();
        let outgoing = transfer_movement(
            item_id,
            -quantity,
            from_department.clone(),
            to_department,
            reason,
            actor,
            now,
        );
        let incoming = transfer_movement(
            destination.id,
            quantity,
            from_department,
            to_department,
            reason,
            actor,
            now,
        );

        let source = apply(tx, source, outgoing).await?;
        let destination = apply(tx, destination, incoming).await?;

        let mut events = self.events_for(&source);
        events.extend(self.events_for(&destination));
        record_events(tx, &events, actor).await?;

        Ok((
            StockTransfer {
                source,
                destination,
                destination_created,
            },
            events,
        ))
    }

    /// Fetch one item
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::NotFound`] if the item does not exist
    pub async fn item(&self, item_id: ItemId) -> Result<InventoryItem> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .item(item_id)
            .await
            .and_then(|item| item.ok_or_else(|| CaduceusError::not_found("inventory item", item_id)));
        finish_read(tx, "item", outcome).await
    }

    /// Movement trail of one item, oldest first
    pub async fn movements(&self, item_id: ItemId) -> Result<Vec<StockMovement>> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            if tx.item(item_id).await?.is_none() {
                return Err(CaduceusError::not_found("inventory item", item_id));
            }
            tx.movements(item_id).await
        }
        .await;
        finish_read(tx, "movements", outcome).await
    }

    /// Compare an item's balance with its movement trail
    pub async fn reconcile(&self, item_id: ItemId) -> Result<StockReconciliation> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            let item = tx
                .item(item_id)
                .await?
                .ok_or_else(|| CaduceusError::not_found("inventory item", item_id))?;
            let movement_total = tx.sum_movement_deltas(item_id).await?;
            Ok::<_, CaduceusError>(StockReconciliation {
                item_id,
                quantity: item.quantity,
                initial_quantity: item.initial_quantity,
                movement_total,
            })
        }
        .await;
        let reconciliation = finish_read(tx, "reconcile", outcome).await?;

        if !reconciliation.is_consistent() {
            tracing::warn!(
                item_id = %item_id,
                drift = %reconciliation.drift(),
                "Stock balance does not match movement trail"
            );
        }
        Ok(reconciliation)
    }

    fn events_for(&self, change: &StockChange) -> Vec<DomainEvent> {
        let item = &change.item;
        let mut events = vec![DomainEvent::StockUpdated(StockUpdated {
            item_id: item.id,
            department_id: item.department.clone(),
            old_quantity: change.old_quantity,
            new_quantity: item.quantity,
            updated_at: item.updated_at,
        })];

        if item.quantity <= self.low_stock_threshold {
            events.push(DomainEvent::StockLowAlert(StockLowAlert {
                item_id: item.id,
                department_id: item.department.clone(),
                quantity: item.quantity,
                threshold: self.low_stock_threshold,
                detected_at: item.updated_at,
            }));
        }
        events
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }
}

async fn register_item_tx(
    tx: &mut dyn LedgerTransaction,
    item: &InventoryItem,
    actor: &str,
) -> Result<()> {
    if let Some(department) = &item.department {
        if tx.department(department).await?.is_none() {
            return Err(CaduceusError::not_found("department", department));
        }
        let occupied = tx
            .lock_item_slot(&item.name, item.batch.as_deref(), department)
            .await?;
        if let Some(existing) = occupied {
            return Err(CaduceusError::InvalidInput(format!(
                "item '{}' batch {:?} is already registered in {} as {}",
                item.name, item.batch, department, existing.id
            )));
        }
    }

    tx.insert_item(item).await?;
    audit::record(
        tx,
        "InventoryItemRegistered",
        serde_json::to_value(item)?,
        Some(actor),
    )
    .await
}

async fn lock_existing(tx: &mut dyn LedgerTransaction, item_id: ItemId) -> Result<InventoryItem> {
    tx.lock_item(item_id)
        .await?
        .ok_or_else(|| CaduceusError::not_found("inventory item", item_id))
}

/// Apply a movement to a locked item
async fn apply(
    tx: &mut dyn LedgerTransaction,
    mut item: InventoryItem,
    movement: StockMovement,
) -> Result<StockChange> {
    let old_quantity = item.quantity;
    let new_quantity = old_quantity + movement.delta;
    if new_quantity.is_sign_negative() && !new_quantity.is_zero() {
        return Err(insufficient(&item, -movement.delta));
    }

    tx.update_item_quantity(item.id, new_quantity, movement.created_at)
        .await?;
    tx.insert_movement(&movement).await?;

    item.quantity = new_quantity;
    item.updated_at = movement.created_at;
    Ok(StockChange {
        item,
        old_quantity,
        movement,
    })
}

async fn record_events(
    tx: &mut dyn LedgerTransaction,
    events: &[DomainEvent],
    actor: &str,
) -> Result<()> {
    for event in events {
        audit::record_event(tx, event, Some(actor)).await?;
    }
    Ok(())
}

fn transfer_movement(
    item_id: ItemId,
    delta: Decimal,
    from_department: Option<DepartmentCode>,
    to_department: &DepartmentCode,
    reason: &str,
    actor: &str,
    at: DateTime<Utc>,
) -> StockMovement {
    StockMovement {
        id: MovementId::new(),
        item_id,
        from_department,
        to_department: Some(to_department.clone()),
        delta,
        movement_type: MovementType::Transfer,
        reason: reason.to_string(),
        actor: actor.to_string(),
        created_at: at,
    }
}

fn insufficient(item: &InventoryItem, requested: Decimal) -> CaduceusError {
    Precondition::InsufficientStock {
        item_id: item.id.to_string(),
        available: item.quantity,
        requested,
    }
    .into()
}

fn validate_movement(quantity: Decimal, reason: &str, actor: &str) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(CaduceusError::InvalidInput(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    require_text("reason", reason)?;
    require_text("actor", actor)
}

fn validate_new_item(request: &NewInventoryItem, actor: &str) -> Result<()> {
    require_text("item name", &request.name)?;
    require_text("actor", actor)?;
    if request.quantity.is_sign_negative() && !request.quantity.is_zero() {
        return Err(CaduceusError::InvalidInput(format!(
            "opening quantity cannot be negative, got {}",
            request.quantity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryLedgerStore;
    use crate::domain::EventKind;
    use std::sync::Mutex;
    use test_case::test_case;

    fn dept(code: &str) -> DepartmentCode {
        DepartmentCode::new(code).unwrap()
    }

    async fn ledger() -> (StockLedger, Arc<EventBus>, MemoryLedgerStore) {
        let store = MemoryLedgerStore::new();
        let bus = Arc::new(EventBus::new("test"));
        let ledger = StockLedger::new(Arc::new(store.clone()), Arc::clone(&bus), Decimal::from(3));
        for (code, name) in [("PHARM", "Pharmacy"), ("WARD", "Ward")] {
            ledger
                .register_department(Department::new(dept(code), name))
                .await
                .unwrap();
        }
        (ledger, bus, store)
    }

    #[test_case(0; "zero")]
    #[test_case(-2; "negative")]
    fn test_non_positive_quantity_rejected(quantity: i64) {
        let err = validate_movement(Decimal::from(quantity), "count", "alice").unwrap_err();
        assert!(matches!(err, CaduceusError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_and_remove_append_movements() {
        let (ledger, _, store) = ledger().await;
        let item = ledger
            .register_item(
                NewInventoryItem::new("Saline 1L", Decimal::from(5)).in_department(dept("PHARM")),
                "alice",
            )
            .await
            .unwrap();

        let added = ledger
            .add_stock(item.id, Decimal::from(10), "delivery", "alice")
            .await
            .unwrap();
        assert_eq!(added.old_quantity, Decimal::from(5));
        assert_eq!(added.new_quantity(), Decimal::from(15));

        let removed = ledger
            .remove_stock(item.id, Decimal::from(3), "dispensed", "bob")
            .await
            .unwrap();
        assert_eq!(removed.movement.delta, Decimal::from(-3));
        assert_eq!(store.movement_count(), 2);
        assert!(ledger.reconcile(item.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_remove_more_than_available_is_rejected() {
        let (ledger, _, store) = ledger().await;
        let item = ledger
            .register_item(NewInventoryItem::new("Gloves", Decimal::from(4)), "alice")
            .await
            .unwrap();

        let err = ledger
            .remove_stock(item.id, Decimal::from(5), "ward round", "alice")
            .await
            .unwrap_err();
        assert!(matches!(
            err.precondition(),
            Some(Precondition::InsufficientStock { .. })
        ));
        assert_eq!(store.movement_count(), 0);
        assert_eq!(ledger.item(item.id).await.unwrap().quantity, Decimal::from(4));
    }

    #[tokio::test]
    async fn test_remove_to_exactly_zero() {
        let (ledger, _, _) = ledger().await;
        let item = ledger
            .register_item(NewInventoryItem::new("Gloves", Decimal::from(4)), "alice")
            .await
            .unwrap();
        let change = ledger
            .remove_stock(item.id, Decimal::from(4), "used", "alice")
            .await
            .unwrap();
        assert_eq!(change.new_quantity(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_low_stock_alert_at_threshold() {
        let (ledger, bus, _) = ledger().await;
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&alerts);
        let _ = bus.subscribe(EventKind::StockLowAlert, move |envelope| {
            sink.lock().unwrap().push(envelope.event.clone());
            Ok(())
        });

        let item = ledger
            .register_item(NewInventoryItem::new("Syringe 5ml", Decimal::from(10)), "alice")
            .await
            .unwrap();
        ledger
            .remove_stock(item.id, Decimal::from(6), "used", "alice")
            .await
            .unwrap();
        assert!(alerts.lock().unwrap().is_empty());

        ledger
            .remove_stock(item.id, Decimal::from(1), "used", "alice")
            .await
            .unwrap();
        assert_eq!(alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_creates_destination_item() {
        let (ledger, _, _) = ledger().await;
        let item = ledger
            .register_item(
                NewInventoryItem::new("Amoxicillin", Decimal::from(20))
                    .with_batch("A1")
                    .in_department(dept("PHARM")),
                "alice",
            )
            .await
            .unwrap();

        let first = ledger
            .transfer_stock(item.id, Decimal::from(5), &dept("WARD"), "ward stock", "alice")
            .await
            .unwrap();
        assert!(first.destination_created);
        assert_eq!(first.source.new_quantity(), Decimal::from(15));
        assert_eq!(first.destination.new_quantity(), Decimal::from(5));
        assert_eq!(first.destination.item.batch.as_deref(), Some("A1"));

        let second = ledger
            .transfer_stock(item.id, Decimal::from(2), &dept("WARD"), "ward stock", "alice")
            .await
            .unwrap();
        assert!(!second.destination_created);
        assert_eq!(second.destination.item.id, first.destination.item.id);
        assert_eq!(second.destination.new_quantity(), Decimal::from(7));

        for id in [item.id, first.destination.item.id] {
            assert!(ledger.reconcile(id).await.unwrap().is_consistent());
        }
    }

    #[tokio::test]
    async fn test_transfer_to_own_department_rejected() {
        let (ledger, _, _) = ledger().await;
        let item = ledger
            .register_item(
                NewInventoryItem::new("Bandage", Decimal::from(5)).in_department(dept("WARD")),
                "alice",
            )
            .await
            .unwrap();

        let err = ledger
            .transfer_stock(item.id, Decimal::from(1), &dept("WARD"), "noop", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CaduceusError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_department() {
        let (ledger, _, _) = ledger().await;
        let item = ledger
            .register_item(NewInventoryItem::new("Bandage", Decimal::from(5)), "alice")
            .await
            .unwrap();

        let err = ledger
            .transfer_stock(item.id, Decimal::from(1), &dept("ICU"), "move", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CaduceusError::NotFound { entity: "department", .. }));
    }

    #[tokio::test]
    async fn test_register_into_occupied_slot_rejected() {
        let (ledger, _, _) = ledger().await;
        let request =
            NewInventoryItem::new("Insulin", Decimal::from(2)).with_batch("X").in_department(dept("PHARM"));
        ledger.register_item(request.clone(), "alice").await.unwrap();
        assert!(matches!(
            ledger.register_item(request, "alice").await,
            Err(CaduceusError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_events_have_audit_rows() {
        let (ledger, _, store) = ledger().await;
        let item = ledger
            .register_item(NewInventoryItem::new("Mask", Decimal::from(50)), "alice")
            .await
            .unwrap();
        ledger
            .add_stock(item.id, Decimal::from(1), "delivery", "alice")
            .await
            .unwrap();

        let types: Vec<String> = store
            .audit_entries()
            .into_iter()
            .map(|entry| entry.event_type)
            .collect();
        assert!(types.contains(&"InventoryItemRegistered".to_string()));
        assert!(types.contains(&"StockUpdated".to_string()));
    }
}
