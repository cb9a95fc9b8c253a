//! End-to-end checkout scenarios over a fully assembled in-memory state

use store_server::checkout::CompleteOrderRequest;
use store_server::core::{Config, ServerState};
use store_server::credit;
use store_server::payment::{gateway::compute_signature, GatewayConfig, NotifyOutcome};
use store_server::orders::OrderError;

use shared::checkout::{LockStatus, SessionStatus};
use shared::credit::CreditNoteStatus;
use shared::models::AddressCreate;
use shared::order::{FulfilmentMethod, ItemStatus, OrderStatus, OtpStatus};
use shared::stock::Sku;
use shared::util::{now_millis, HOUR_MS, MINUTE_MS};
use std::collections::HashMap;

async fn test_state() -> ServerState {
    let mut config = Config::with_overrides("unused", 0);
    config.gateway = GatewayConfig {
        merchant_id: "10000100".to_string(),
        merchant_key: "46f0cd694581a".to_string(),
        passphrase: "secret".to_string(),
    };
    ServerState::initialize_in_memory(config)
        .await
        .expect("in-memory state")
}

fn seed_sku(state: &ServerState, sku_id: &str, price: f64, stock: i64) {
    let txn = state.ledger.begin_write().unwrap();
    state
        .ledger
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

async fn seed_gauteng_address(state: &ServerState, user_id: &str) -> String {
    state
        .addresses
        .create(AddressCreate {
            user_id: user_id.to_string(),
            recipient_name: "T. Mokoena".to_string(),
            phone: "+27110000000".to_string(),
            street: "1 Long Street".to_string(),
            city: "Johannesburg".to_string(),
            province: "GAUTENG".to_string(),
            postal_code: "2000".to_string(),
        })
        .await
        .unwrap()
        .public_id
}

fn seed_credit_note(state: &ServerState, user_id: &str, amount: f64) -> String {
    let txn = state.ledger.begin_write().unwrap();
    let note = credit::issue(
        &state.ledger,
        &txn,
        user_id,
        amount,
        24 * HOUR_MS,
        None,
        now_millis(),
    )
    .unwrap();
    txn.commit().unwrap();
    note.code
}

fn signed_notification(
    order_number: &str,
    txn_id: &str,
    status: &str,
    amount: f64,
) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert("merchant_id".to_string(), "10000100".to_string());
    fields.insert("merchant_key".to_string(), "46f0cd694581a".to_string());
    fields.insert("m_payment_id".to_string(), order_number.to_string());
    fields.insert("pf_payment_id".to_string(), txn_id.to_string());
    fields.insert("payment_status".to_string(), status.to_string());
    fields.insert("amount_gross".to_string(), format!("{:.2}", amount));
    let signature = compute_signature(fields.iter(), "secret");
    fields.insert("signature".to_string(), signature);
    fields
}

#[tokio::test]
async fn test_gauteng_delivery_checkout_scenario() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);
    seed_sku(&state, "sku-b", 50.0, 1);
    let address_id = seed_gauteng_address(&state, "user-1").await;

    state.cart.add_item("user-1", "sku-a", 2).await.unwrap();
    state.cart.add_item("user-1", "sku-b", 1).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();

    let session = state.checkout.create("user-1", &cart, None, None).unwrap();
    let address = state.addresses.resolve(&address_id, "user-1").await.unwrap();
    let order = state
        .checkout
        .complete_order(
            &session.session_id,
            CompleteOrderRequest {
                fulfilment: FulfilmentMethod::Delivery,
                shipping_address: Some(address),
                cart,
                note: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(order.subtotal, 250.0);
    assert_eq!(order.tax, 37.50);
    assert_eq!(order.shipping_fee, 99.0);
    assert_eq!(order.total, 386.50);
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD"));

    let a = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(a.reserved_quantity, 2);
    let b = state.ledger.get_sku("sku-b").unwrap().unwrap();
    assert_eq!(b.reserved_quantity, 1);
}

#[tokio::test]
async fn test_credit_note_validation_and_partial_application() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);
    let code = seed_credit_note(&state, "user-1", 100.0);

    // Requesting 150 against remaining 100 is rejected before any lock
    let err = state
        .checkout
        .validate_credit_note(&code, "user-1", 150.0)
        .unwrap_err();
    assert!(err.to_string().contains("exceeds available balance"));
    assert!(state.ledger.get_credit_lock(&code).unwrap().is_none());

    // Apply 80 of the 100 through a pickup checkout
    state.cart.add_item("user-1", "sku-a", 1).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();
    let session = state
        .checkout
        .create("user-1", &cart, Some(&code), Some(80.0))
        .unwrap();
    let order = state
        .checkout
        .complete_order(
            &session.session_id,
            CompleteOrderRequest {
                fulfilment: FulfilmentMethod::Pickup,
                shipping_address: None,
                cart,
                note: None,
            },
        )
        .await
        .unwrap();

    // 100 + 15% VAT - 80 credit
    assert_eq!(order.credit_note_amount, 80.0);
    assert_eq!(order.total, 35.0);

    let note = state.ledger.get_credit_note(&code).unwrap().unwrap();
    assert_eq!(note.amount_remaining, 20.0);
    assert_eq!(note.status, CreditNoteStatus::PartiallyUsed);
    assert_eq!(
        note.consumed_by_order.as_deref(),
        Some(order.order_id.as_str())
    );
}

#[tokio::test]
async fn test_session_expiry_releases_stock_locks() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);

    state.cart.add_item("user-1", "sku-a", 2).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();
    let session = state.checkout.create("user-1", &cart, None, None).unwrap();

    // Simulate access 31 minutes after creation by rewinding the stored
    // expiry past now
    let txn = state.ledger.begin_write().unwrap();
    let mut stale = state
        .ledger
        .load_session(&txn, &session.session_id)
        .unwrap()
        .unwrap();
    stale.expires_at = now_millis() - MINUTE_MS;
    state.ledger.store_session(&txn, &stale).unwrap();
    txn.commit().unwrap();

    assert!(matches!(
        state.checkout.get(&session.session_id),
        Err(OrderError::SessionExpired(_))
    ));

    let expired = state
        .ledger
        .get_session(&session.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, SessionStatus::Expired);
    assert!(expired
        .stock_locks
        .iter()
        .all(|l| l.status == LockStatus::Released));

    // Completion after expiry is rejected too
    assert!(matches!(
        state
            .checkout
            .complete_order(
                &session.session_id,
                CompleteOrderRequest {
                    fulfilment: FulfilmentMethod::Pickup,
                    shipping_address: None,
                    cart: vec![],
                    note: None,
                },
            )
            .await,
        Err(OrderError::SessionExpired(_))
    ));
}

#[tokio::test]
async fn test_full_pickup_lifecycle_with_webhook_payment() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);

    state.cart.add_item("user-1", "sku-a", 2).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();
    let session = state.checkout.create("user-1", &cart, None, None).unwrap();
    let order = state
        .checkout
        .complete_order(
            &session.session_id,
            CompleteOrderRequest {
                fulfilment: FulfilmentMethod::Pickup,
                shipping_address: None,
                cart,
                note: Some("gift wrap please".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(order.total, 230.0); // 200 + 15% VAT, no shipping

    // Gateway confirms payment via webhook
    let outcome = state
        .reconciler
        .notify(signed_notification(&order.order_number, "pf-777", "COMPLETE", 230.0))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        NotifyOutcome::Applied {
            status: OrderStatus::Paid,
            ..
        }
    ));

    // Back office prepares the pickup
    let order = state.orders.start_processing(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    let otp = order.pickup_otp.clone().expect("pickup order gets an OTP");
    assert_eq!(otp.status, OtpStatus::Active);

    // Stock allocated out of on-hand
    let sku = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(sku.stock_quantity, 3);
    assert_eq!(sku.reserved_quantity, 0);

    // Customer collects with the code
    let order = state
        .orders
        .process_pickup(&order.order_id, &otp.code, "staff-1")
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert!(order.notes.iter().any(|n| n.contains("staff-1")));

    // Refund closes the lifecycle
    let order = state
        .orders
        .refund(&order.order_id, 230.0, "warranty return")
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.payments.last().unwrap().amount, -230.0);
}

#[tokio::test]
async fn test_cancel_after_processing_restores_stock_round_trip() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);

    state.cart.add_item("user-1", "sku-a", 2).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();
    let session = state.checkout.create("user-1", &cart, None, None).unwrap();
    let order = state
        .checkout
        .complete_order(
            &session.session_id,
            CompleteOrderRequest {
                fulfilment: FulfilmentMethod::Delivery,
                shipping_address: Some(shared::models::Address {
                    public_id: "addr-1".to_string(),
                    user_id: "user-1".to_string(),
                    recipient_name: "T. Mokoena".to_string(),
                    phone: "+27110000000".to_string(),
                    street: "1 Long Street".to_string(),
                    city: "Johannesburg".to_string(),
                    province: "GAUTENG".to_string(),
                    postal_code: "2000".to_string(),
                }),
                cart,
                note: None,
            },
        )
        .await
        .unwrap();

    state
        .reconciler
        .notify(signed_notification(&order.order_number, "pf-1", "COMPLETE", order.total))
        .await
        .unwrap();
    state.orders.start_processing(&order.order_id).await.unwrap();

    // After allocation: on-hand 3, reserved 0, items FULFILLED
    let sku = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(sku.stock_quantity, 3);

    let cancelled = state
        .orders
        .cancel(&order.order_id, "customer changed mind")
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled
        .items
        .iter()
        .all(|i| i.status == ItemStatus::Cancelled));

    // Round-trip: on-hand back to its pre-processing value
    let sku = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(sku.stock_quantity, 5);
    assert_eq!(sku.reserved_quantity, 0);
}

#[tokio::test]
async fn test_failed_payment_webhook_cancels_and_releases() {
    let state = test_state().await;
    seed_sku(&state, "sku-a", 100.0, 5);

    state.cart.add_item("user-1", "sku-a", 2).await.unwrap();
    let cart = state.cart.get_cart("user-1").await.unwrap();
    let session = state.checkout.create("user-1", &cart, None, None).unwrap();
    let order = state
        .checkout
        .complete_order(
            &session.session_id,
            CompleteOrderRequest {
                fulfilment: FulfilmentMethod::Pickup,
                shipping_address: None,
                cart,
                note: None,
            },
        )
        .await
        .unwrap();

    let sku = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(sku.reserved_quantity, 2);

    state
        .reconciler
        .notify(signed_notification(&order.order_number, "pf-1", "FAILED", order.total))
        .await
        .unwrap();

    let order = state.orders.get_order(&order.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    let sku = state.ledger.get_sku("sku-a").unwrap().unwrap();
    assert_eq!(sku.reserved_quantity, 0);
    assert_eq!(sku.stock_quantity, 5);
}
