//! CreateOrder command handler
//!
//! Turns a cart snapshot into a PENDING order. Runs inside the checkout
//! completion transaction: the per-SKU availability re-check and the
//! reservation commit atomically with the order write, so two sessions
//! draining the same SKU cannot both take the last unit.

use async_trait::async_trait;

use shared::models::{Address, CartItem};
use shared::order::{FulfilmentMethod, ItemStatus, Order, OrderItem, OrderStatus};

use crate::orders::money::{self, compute_order_totals, line_total, to_decimal};
use crate::orders::shipping::shipping_fee;
use crate::orders::traits::{ActionOutcome, CommandContext, CommandHandler, OrderError, OrderResult};
use crate::services::notifier::DomainEvent;
use crate::stock;

/// CreateOrder action
#[derive(Debug, Clone)]
pub struct CreateOrderAction {
    /// Pre-generated aggregate id
    pub order_id: String,
    /// Pre-generated order number (sequence-based, allocated before the
    /// transaction because the counter needs its own write transaction)
    pub order_number: String,
    pub user_id: String,
    pub fulfilment: FulfilmentMethod,
    /// Resolved, ownership-checked address (DELIVERY only)
    pub shipping_address: Option<Address>,
    /// Cart rows loaded before the transaction; stock is re-verified here
    pub cart: Vec<CartItem>,
    pub note: Option<String>,
    /// Credit locked by the session, already validated
    pub credit_amount: f64,
}

#[async_trait]
impl CommandHandler for CreateOrderAction {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome> {
        // 1. DELIVERY requires a resolved address; PICKUP forbids one
        let address = match self.fulfilment {
            FulfilmentMethod::Delivery => match &self.shipping_address {
                Some(addr) => Some(addr.clone()),
                None => {
                    return Err(OrderError::AddressNotFound(
                        "delivery orders require a shipping address".to_string(),
                    ))
                }
            },
            FulfilmentMethod::Pickup => None,
        };

        // 2. Empty cart check
        if self.cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        // 3. Re-verify stock per item at commit time and price the lines.
        //    This check is authoritative over any earlier add-to-cart check.
        let mut items = Vec::with_capacity(self.cart.len());
        let mut subtotal = rust_decimal::Decimal::ZERO;
        for row in &self.cart {
            money::validate_quantity(row.quantity)?;
            let sku = stock::check_available(
                ctx.storage(),
                ctx.txn(),
                &row.sku_id,
                i64::from(row.quantity),
            )?;
            let total = line_total(sku.price, row.quantity);
            subtotal += to_decimal(total);
            items.push(OrderItem {
                sku_id: sku.sku_id.clone(),
                name: sku.name.clone(),
                quantity: row.quantity,
                unit_price: sku.price,
                line_total: total,
                status: ItemStatus::Pending,
            });
        }

        // 3b. Reserve the units in the same transaction. This is what makes
        //     N concurrent checkouts against K available units end with
        //     exactly K reserved and the rest rejected.
        stock::reserve_on_confirm(ctx.storage(), ctx.txn(), &items, ctx.now)?;

        // 4. Monetary breakdown: 15% VAT, province shipping, credit clamp
        let fee = shipping_fee(
            self.fulfilment,
            address.as_ref().map(|a| a.province.as_str()),
            subtotal,
        );
        let totals = compute_order_totals(subtotal, fee, to_decimal(self.credit_amount));

        // 5. Order number must be unique; the sequence counter makes a
        //    collision impossible short of ledger corruption
        if ctx
            .storage()
            .order_number_exists(ctx.txn(), &self.order_number)?
        {
            return Err(OrderError::Internal(format!(
                "order number collision: {}",
                self.order_number
            )));
        }

        // 6. Persist the aggregate
        let mut order = Order {
            order_id: self.order_id.clone(),
            order_number: self.order_number.clone(),
            user_id: self.user_id.clone(),
            status: OrderStatus::Pending,
            fulfilment: self.fulfilment,
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping_fee: totals.shipping_fee,
            discount: 0.0,
            credit_note_amount: totals.credit_applied,
            total: totals.total,
            shipping_address: address,
            notes: self.note.iter().cloned().collect(),
            items,
            shipment: None,
            pickup_otp: None,
            payments: vec![],
            version: 0,
            created_at: ctx.now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            updated_at: ctx.now,
        };
        ctx.store_order(&mut order)?;

        tracing::info!(
            order_id = %order.order_id,
            order_number = %order.order_number,
            user_id = %order.user_id,
            total = order.total,
            "Order created"
        );

        let event = DomainEvent::OrderCreated {
            order_id: order.order_id.clone(),
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
        };
        Ok(ActionOutcome::with_event(order, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::storage::LedgerStorage;
    use shared::stock::Sku;

    fn seed_sku(storage: &LedgerStorage, sku_id: &str, price: f64, stock: i64) {
        let txn = storage.begin_write().unwrap();
        storage
            .store_sku(
                &txn,
                &Sku {
                    sku_id: sku_id.to_string(),
                    name: format!("Product {}", sku_id),
                    price,
                    stock_quantity: stock,
                    reserved_quantity: 0,
                    low_stock_threshold: 0,
                    active: true,
                    updated_at: 0,
                },
            )
            .unwrap();
        txn.commit().unwrap();
    }

    fn cart_row(sku_id: &str, quantity: i32) -> CartItem {
        CartItem {
            user_id: "user-1".to_string(),
            sku_id: sku_id.to_string(),
            quantity,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn gauteng_address() -> Address {
        Address {
            public_id: "addr-1".to_string(),
            user_id: "user-1".to_string(),
            recipient_name: "T. Mokoena".to_string(),
            phone: "+27110000000".to_string(),
            street: "1 Long Street".to_string(),
            city: "Johannesburg".to_string(),
            province: "GAUTENG".to_string(),
            postal_code: "2000".to_string(),
        }
    }

    fn action(cart: Vec<CartItem>) -> CreateOrderAction {
        CreateOrderAction {
            order_id: "order-1".to_string(),
            order_number: "ORD2026080510001".to_string(),
            user_id: "user-1".to_string(),
            fulfilment: FulfilmentMethod::Delivery,
            shipping_address: Some(gauteng_address()),
            cart,
            note: None,
            credit_amount: 0.0,
        }
    }

    #[tokio::test]
    async fn test_create_order_gauteng_scenario() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 5);
        seed_sku(&storage, "sku-b", 50.0, 1);

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        let outcome = action(vec![cart_row("sku-a", 2), cart_row("sku-b", 1)])
            .execute(&ctx)
            .await
            .unwrap();
        drop(ctx);
        txn.commit().unwrap();

        let order = outcome.order;
        assert_eq!(order.subtotal, 250.0);
        assert_eq!(order.tax, 37.50);
        assert_eq!(order.shipping_fee, 99.0);
        assert_eq!(order.total, 386.50);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert!(order
            .items
            .iter()
            .all(|i| i.status == ItemStatus::Pending));

        // Creation reserves, atomically with the availability check
        let a = storage.get_sku("sku-a").unwrap().unwrap();
        assert_eq!(a.reserved_quantity, 2);
        assert_eq!(a.stock_quantity, 5);
        let b = storage.get_sku("sku-b").unwrap().unwrap();
        assert_eq!(b.reserved_quantity, 1);
    }

    #[tokio::test]
    async fn test_create_order_empty_cart_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        let result = action(vec![]).execute(&ctx).await;
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_create_order_insufficient_stock_names_sku() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 1);

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        let result = action(vec![cart_row("sku-a", 2)]).execute(&ctx).await;
        match result {
            Err(OrderError::InsufficientStock { sku_id, .. }) => assert_eq!(sku_id, "sku-a"),
            other => panic!("expected InsufficientStock, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_create_order_delivery_without_address_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 5);

        let mut act = action(vec![cart_row("sku-a", 1)]);
        act.shipping_address = None;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        assert!(matches!(
            act.execute(&ctx).await,
            Err(OrderError::AddressNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_pickup_has_no_shipping_fee() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 5);

        let mut act = action(vec![cart_row("sku-a", 1)]);
        act.fulfilment = FulfilmentMethod::Pickup;
        act.shipping_address = None;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        let outcome = act.execute(&ctx).await.unwrap();

        assert_eq!(outcome.order.shipping_fee, 0.0);
        assert!(outcome.order.shipping_address.is_none());
        assert_eq!(outcome.order.total, 115.0); // 100 + 15% VAT
    }

    #[tokio::test]
    async fn test_create_order_with_credit_reduces_total() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 5);

        let mut act = action(vec![cart_row("sku-a", 1)]);
        act.fulfilment = FulfilmentMethod::Pickup;
        act.shipping_address = None;
        act.credit_amount = 80.0;

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        let outcome = act.execute(&ctx).await.unwrap();

        assert_eq!(outcome.order.credit_note_amount, 80.0);
        assert_eq!(outcome.order.total, 35.0); // 115 - 80
    }

    #[tokio::test]
    async fn test_create_order_inactive_product_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        storage
            .store_sku(
                &txn,
                &Sku {
                    sku_id: "sku-a".to_string(),
                    name: "Retired".to_string(),
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
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        assert!(matches!(
            action(vec![cart_row("sku-a", 1)]).execute(&ctx).await,
            Err(OrderError::ProductInactive(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_invalid_quantity_fails() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        seed_sku(&storage, "sku-a", 100.0, 5);

        let txn = storage.begin_write().unwrap();
        let ctx = CommandContext::new(&txn, &storage, 1_000);
        assert!(matches!(
            action(vec![cart_row("sku-a", 0)]).execute(&ctx).await,
            Err(OrderError::InvalidQuantity(_))
        ));
    }
}
