//! Test fixtures for workflow action tests

use shared::models::{Address, CartItem};
use shared::order::FulfilmentMethod;
use shared::stock::Sku;

use super::actions::{
    CreateOrderAction, DeliverAction, PaymentSuccessAction, ShipAction, StartProcessingAction,
};
use super::storage::LedgerStorage;
use super::traits::{CommandContext, CommandHandler};

/// How far through the lifecycle the seeded order should be driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
}

pub fn gauteng_address() -> Address {
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

pub fn widget_sku(stock: i64) -> Sku {
    Sku {
        sku_id: "sku-1".to_string(),
        name: "Widget".to_string(),
        price: 100.0,
        stock_quantity: stock,
        reserved_quantity: 0,
        low_stock_threshold: 0,
        active: true,
        updated_at: 0,
    }
}

/// Seed `order-1` (2 x sku-1 @ 100.00, stock 5) and drive it to `stage`.
pub async fn seed_order(storage: &LedgerStorage, fulfilment: FulfilmentMethod, stage: Stage) {
    let txn = storage.begin_write().unwrap();
    storage.store_sku(&txn, &widget_sku(5)).unwrap();

    let ctx = CommandContext::new(&txn, storage, 1_000);
    CreateOrderAction {
        order_id: "order-1".to_string(),
        order_number: "ORD2026080510001".to_string(),
        user_id: "user-1".to_string(),
        fulfilment,
        shipping_address: (fulfilment == FulfilmentMethod::Delivery).then(gauteng_address),
        cart: vec![CartItem {
            user_id: "user-1".to_string(),
            sku_id: "sku-1".to_string(),
            quantity: 2,
            created_at: 0,
            updated_at: 0,
        }],
        note: None,
        credit_amount: 0.0,
    }
    .execute(&ctx)
    .await
    .unwrap();

    if stage >= Stage::Paid {
        PaymentSuccessAction {
            order_id: "order-1".to_string(),
            txn_id: "pf-1".to_string(),
            amount: if fulfilment == FulfilmentMethod::Delivery {
                329.0
            } else {
                230.0
            },
            method: "GATEWAY".to_string(),
            currency: "ZAR".to_string(),
        }
        .execute(&ctx)
        .await
        .unwrap();
    }

    if stage >= Stage::Processing {
        StartProcessingAction {
            order_id: "order-1".to_string(),
        }
        .execute(&ctx)
        .await
        .unwrap();
    }

    if stage >= Stage::Shipped {
        ShipAction {
            order_id: "order-1".to_string(),
            courier: "CourierGuy".to_string(),
            tracking_number: Some("TRK-1".to_string()),
        }
        .execute(&ctx)
        .await
        .unwrap();
    }

    if stage >= Stage::Delivered {
        DeliverAction {
            order_id: "order-1".to_string(),
            proof_of_delivery: None,
        }
        .execute(&ctx)
        .await
        .unwrap();
    }

    drop(ctx);
    txn.commit().unwrap();
}
