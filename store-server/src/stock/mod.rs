//! Stock ledger
//!
//! Per-SKU available/reserved/on-hand tracking. All mutation helpers take
//! the caller's write transaction so a workflow step and its stock effects
//! commit as one atomic unit.
//!
//! Lifecycle of a unit:
//! - order creation: `reserve_on_confirm` (reserved += qty), atomic with the
//!   availability re-check
//! - start processing: `allocate_on_processing` (on-hand -= qty, reserved -= qty)
//! - cancel: `release_on_cancel` (PENDING/CONFIRMED → un-reserve,
//!   FULFILLED → restock)
//!
//! Invariant: `0 <= reserved_quantity <= stock_quantity` after every
//! operation; a violation is ledger corruption and surfaces as an internal
//! error, never as silent clamping.

use redb::WriteTransaction;
use shared::order::{ItemStatus, OrderItem};
use shared::stock::Sku;

use crate::orders::storage::{LedgerStorage, StorageError};
use crate::orders::traits::{OrderError, OrderResult};
use crate::services::notifier::DomainEvent;

fn load_sku(storage: &LedgerStorage, txn: &WriteTransaction, sku_id: &str) -> OrderResult<Sku> {
    match storage.load_sku(txn, sku_id) {
        Ok(sku) => Ok(sku),
        Err(StorageError::SkuNotFound(id)) => Err(OrderError::ProductNotFound(id)),
        Err(e) => Err(e.into()),
    }
}

/// Load a SKU and verify it can satisfy `quantity` right now.
///
/// This is the authoritative availability check: it runs inside the write
/// transaction, so no concurrent checkout can invalidate it before commit.
pub fn check_available(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    sku_id: &str,
    quantity: i64,
) -> OrderResult<Sku> {
    let sku = load_sku(storage, txn, sku_id)?;
    if !sku.active {
        return Err(OrderError::ProductInactive(sku_id.to_string()));
    }
    let available = sku.available();
    if available < quantity {
        return Err(OrderError::InsufficientStock {
            sku_id: sku_id.to_string(),
            requested: quantity,
            available,
        });
    }
    Ok(sku)
}

/// Reserve units for a confirmed order: `reserved += qty`.
///
/// Runs inside the order-creation transaction, so the availability check
/// and the reservation commit as one unit — concurrent checkouts cannot
/// both take the last unit.
pub fn reserve_on_confirm(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    items: &[OrderItem],
    now: i64,
) -> OrderResult<()> {
    for item in items {
        let qty = i64::from(item.quantity);
        let mut sku = check_available(storage, txn, &item.sku_id, qty)?;
        sku.reserved_quantity += qty;
        sku.updated_at = now;
        storage.store_sku(txn, &sku)?;
    }
    Ok(())
}

/// Move reserved units out of on-hand stock: `stock -= qty, reserved -= qty`.
///
/// Returns low-stock events for SKUs that crossed their threshold.
pub fn allocate_on_processing(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    items: &[OrderItem],
    now: i64,
) -> OrderResult<Vec<DomainEvent>> {
    let mut events = Vec::new();
    for item in items {
        let qty = i64::from(item.quantity);
        let mut sku = load_sku(storage, txn, &item.sku_id)?;
        if sku.reserved_quantity < qty || sku.stock_quantity < qty {
            return Err(OrderError::Internal(format!(
                "stock ledger inconsistency for SKU {}: stock={}, reserved={}, allocating {}",
                sku.sku_id, sku.stock_quantity, sku.reserved_quantity, qty
            )));
        }
        sku.stock_quantity -= qty;
        sku.reserved_quantity -= qty;
        sku.updated_at = now;

        if sku.available() < sku.low_stock_threshold {
            tracing::warn!(
                sku_id = %sku.sku_id,
                available = sku.available(),
                threshold = sku.low_stock_threshold,
                "SKU below low-stock threshold"
            );
            events.push(DomainEvent::LowStock {
                sku_id: sku.sku_id.clone(),
                available: sku.available(),
            });
        }

        storage.store_sku(txn, &sku)?;
    }
    Ok(events)
}

/// Release stock for cancelled items, according to how far each item got:
/// PENDING and CONFIRMED units were only reserved (`reserved -= qty`);
/// FULFILLED units were taken out of stock (`stock += qty`); CANCELLED
/// units already released.
pub fn release_on_cancel(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    items: &[OrderItem],
    now: i64,
) -> OrderResult<()> {
    for item in items {
        let qty = i64::from(item.quantity);
        match item.status {
            ItemStatus::Pending | ItemStatus::Confirmed => {
                let mut sku = load_sku(storage, txn, &item.sku_id)?;
                if sku.reserved_quantity < qty {
                    return Err(OrderError::Internal(format!(
                        "stock ledger inconsistency for SKU {}: reserved={}, releasing {}",
                        sku.sku_id, sku.reserved_quantity, qty
                    )));
                }
                sku.reserved_quantity -= qty;
                sku.updated_at = now;
                storage.store_sku(txn, &sku)?;
            }
            ItemStatus::Fulfilled => {
                let mut sku = load_sku(storage, txn, &item.sku_id)?;
                sku.stock_quantity += qty;
                sku.updated_at = now;
                storage.store_sku(txn, &sku)?;
            }
            ItemStatus::Cancelled => {}
        }
    }
    Ok(())
}

/// Create or replace a SKU (admin/seeding surface)
pub fn upsert_sku(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    sku: &Sku,
) -> OrderResult<()> {
    if sku.stock_quantity < 0 || sku.reserved_quantity < 0 {
        return Err(OrderError::InvalidQuantity(
            "stock and reserved quantities must be non-negative".to_string(),
        ));
    }
    if sku.reserved_quantity > sku.stock_quantity {
        return Err(OrderError::InvalidQuantity(
            "reserved quantity cannot exceed stock quantity".to_string(),
        ));
    }
    storage.store_sku(txn, sku)?;
    Ok(())
}

/// Adjust on-hand stock by a signed delta (goods received / corrections).
///
/// Rejects adjustments that would leave `stock < reserved` or `stock < 0`.
pub fn adjust_stock(
    storage: &LedgerStorage,
    txn: &WriteTransaction,
    sku_id: &str,
    delta: i64,
    now: i64,
) -> OrderResult<Sku> {
    let mut sku = load_sku(storage, txn, sku_id)?;
    let new_stock = sku.stock_quantity + delta;
    if new_stock < 0 || new_stock < sku.reserved_quantity {
        return Err(OrderError::InvalidQuantity(format!(
            "adjustment {} would leave SKU {} with stock {} below reserved {}",
            delta, sku_id, new_stock, sku.reserved_quantity
        )));
    }
    sku.stock_quantity = new_stock;
    sku.updated_at = now;
    storage.store_sku(txn, &sku)?;
    Ok(sku)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::ItemStatus;

    fn seed_sku(storage: &LedgerStorage, sku_id: &str, stock: i64, reserved: i64) {
        let txn = storage.begin_write().unwrap();
        storage
            .store_sku(
                &txn,
                &Sku {
                    sku_id: sku_id.to_string(),
                    name: "Widget".to_string(),
                    price: 100.0,
                    stock_quantity: stock,
                    reserved_quantity: reserved,
                    low_stock_threshold: 2,
                    active: true,
                    updated_at: 0,
                },
            )
            .unwrap();
        txn.commit().unwrap();
    }

    fn item(sku_id: &str, quantity: i32, status: ItemStatus) -> OrderItem {
        OrderItem {
            sku_id: sku_id.to_string(),
            name: "Widget".to_string(),
            quantity,
            unit_price: 100.0,
            line_total: 100.0 * f64::from(quantity),
            status,
        }
    }

    #[test]
    fn test_reserve_then_allocate() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-1", 5, 0);
        let items = [item("sku-1", 2, ItemStatus::Confirmed)];

        let txn = storage.begin_write().unwrap();
        reserve_on_confirm(&storage, &txn, &items, 1).unwrap();
        txn.commit().unwrap();

        let sku = storage.get_sku("sku-1").unwrap().unwrap();
        assert_eq!(sku.stock_quantity, 5);
        assert_eq!(sku.reserved_quantity, 2);
        assert_eq!(sku.available(), 3);

        let txn = storage.begin_write().unwrap();
        allocate_on_processing(&storage, &txn, &items, 2).unwrap();
        txn.commit().unwrap();

        let sku = storage.get_sku("sku-1").unwrap().unwrap();
        assert_eq!(sku.stock_quantity, 3);
        assert_eq!(sku.reserved_quantity, 0);
    }

    #[test]
    fn test_reserve_insufficient_stock_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-1", 1, 0);
        let items = [item("sku-1", 2, ItemStatus::Confirmed)];

        let txn = storage.begin_write().unwrap();
        let result = reserve_on_confirm(&storage, &txn, &items, 1);
        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_available_accounts_for_reservations() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-1", 5, 4);

        let txn = storage.begin_write().unwrap();
        // 5 on hand but 4 reserved: only 1 available
        assert!(check_available(&storage, &txn, "sku-1", 1).is_ok());
        assert!(matches!(
            check_available(&storage, &txn, "sku-1", 2),
            Err(OrderError::InsufficientStock { available: 1, .. })
        ));
    }

    #[test]
    fn test_inactive_sku_rejected() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        storage
            .store_sku(
                &txn,
                &Sku {
                    sku_id: "sku-1".to_string(),
                    name: "Widget".to_string(),
                    price: 100.0,
                    stock_quantity: 5,
                    reserved_quantity: 0,
                    low_stock_threshold: 0,
                    active: false,
                    updated_at: 0,
                },
            )
            .unwrap();
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        assert!(matches!(
            check_available(&storage, &txn, "sku-1", 1),
            Err(OrderError::ProductInactive(_))
        ));
    }

    #[test]
    fn test_release_by_item_status() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 5, 2);
        seed_sku(&storage, "sku-b", 3, 0);
        seed_sku(&storage, "sku-c", 4, 1);

        let items = [
            item("sku-a", 2, ItemStatus::Confirmed),
            item("sku-b", 1, ItemStatus::Fulfilled),
            item("sku-c", 1, ItemStatus::Pending),
        ];

        let txn = storage.begin_write().unwrap();
        release_on_cancel(&storage, &txn, &items, 1).unwrap();
        txn.commit().unwrap();

        // CONFIRMED: un-reserved
        let a = storage.get_sku("sku-a").unwrap().unwrap();
        assert_eq!(a.stock_quantity, 5);
        assert_eq!(a.reserved_quantity, 0);

        // FULFILLED: restocked
        let b = storage.get_sku("sku-b").unwrap().unwrap();
        assert_eq!(b.stock_quantity, 4);
        assert_eq!(b.reserved_quantity, 0);

        // PENDING: reserved at creation, un-reserved on cancel
        let c = storage.get_sku("sku-c").unwrap().unwrap();
        assert_eq!(c.stock_quantity, 4);
        assert_eq!(c.reserved_quantity, 0);
    }

    #[test]
    fn test_allocate_emits_low_stock_event() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-1", 3, 2);
        let items = [item("sku-1", 2, ItemStatus::Confirmed)];

        let txn = storage.begin_write().unwrap();
        let events = allocate_on_processing(&storage, &txn, &items, 1).unwrap();
        txn.commit().unwrap();

        // 1 left on hand, threshold 2
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            DomainEvent::LowStock { available: 1, .. }
        ));
    }

    #[test]
    fn test_adjust_stock_guards_reserved() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-1", 5, 3);

        let txn = storage.begin_write().unwrap();
        // Dropping to 2 would leave stock below the 3 reserved units
        assert!(adjust_stock(&storage, &txn, "sku-1", -3, 1).is_err());
        let sku = adjust_stock(&storage, &txn, "sku-1", -2, 1).unwrap();
        assert_eq!(sku.stock_quantity, 3);
        txn.commit().unwrap();
    }
}
