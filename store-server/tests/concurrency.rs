//! Concurrency properties: credit-lock mutual exclusion, no oversell,
//! webhook replay idempotency, and no lost updates on the same order.

use store_server::checkout::CompleteOrderRequest;
use store_server::core::{Config, ServerState};
use store_server::credit;
use store_server::payment::{gateway::compute_signature, GatewayConfig, NotifyOutcome};
use store_server::orders::OrderError;

use shared::models::CartItem;
use shared::order::{FulfilmentMethod, OrderStatus};
use shared::stock::Sku;
use shared::util::{now_millis, HOUR_MS};
use std::collections::HashMap;
use std::sync::Arc;

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

fn seed_sku(state: &ServerState, sku_id: &str, stock: i64) {
    let txn = state.ledger.begin_write().unwrap();
    state
        .ledger
        .store_sku(
            &txn,
            &Sku {
                sku_id: sku_id.to_string(),
                name: "Widget".to_string(),
                price: 100.0,
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

fn cart_row(user_id: &str, quantity: i32) -> CartItem {
    CartItem {
        user_id: user_id.to_string(),
        sku_id: "sku-1".to_string(),
        quantity,
        created_at: 0,
        updated_at: 0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_credit_lock_mutual_exclusion() {
    let state = Arc::new(test_state().await);

    let code = {
        let txn = state.ledger.begin_write().unwrap();
        let note = credit::issue(
            &state.ledger,
            &txn,
            "user-1",
            100.0,
            24 * HOUR_MS,
            None,
            now_millis(),
        )
        .unwrap();
        txn.commit().unwrap();
        note.code
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let code = code.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            state.checkout.create("user-1", &[], Some(&code), Some(50.0))
        }));
    }

    let mut successes = 0;
    let mut locked_rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => {
                assert!(
                    err.to_string().contains("locked by another session"),
                    "unexpected error: {}",
                    err
                );
                locked_rejections += 1;
            }
        }
    }

    // Exactly one session holds the lock
    assert_eq!(successes, 1);
    assert_eq!(locked_rejections, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_no_oversell_under_concurrent_checkout() {
    let state = Arc::new(test_state().await);
    seed_sku(&state, "sku-1", 3);

    let mut handles = Vec::new();
    for i in 0..5 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let user_id = format!("user-{}", i);
            let cart = vec![cart_row(&user_id, 1)];
            let session = state.checkout.create(&user_id, &cart, None, None)?;
            state
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
        }));
    }

    let mut successes = 0;
    let mut stock_rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(OrderError::InsufficientStock { .. }) => stock_rejections += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    // availableQuantity = 3, 5 single-unit checkouts: exactly 3 succeed
    assert_eq!(successes, 3);
    assert_eq!(stock_rejections, 2);

    let sku = state.ledger.get_sku("sku-1").unwrap().unwrap();
    assert_eq!(sku.reserved_quantity, 3);
    assert_eq!(sku.stock_quantity, 3);
    assert_eq!(sku.available(), 0);
    assert!(sku.reserved_quantity <= sku.stock_quantity);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_webhook_replay_applies_exactly_once() {
    let state = Arc::new(test_state().await);
    seed_sku(&state, "sku-1", 5);

    let cart = vec![cart_row("user-1", 2)];
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

    let mut fields = HashMap::new();
    fields.insert("merchant_id".to_string(), "10000100".to_string());
    fields.insert("merchant_key".to_string(), "46f0cd694581a".to_string());
    fields.insert("m_payment_id".to_string(), order.order_number.clone());
    fields.insert("pf_payment_id".to_string(), "pf-replay".to_string());
    fields.insert("payment_status".to_string(), "COMPLETE".to_string());
    fields.insert("amount_gross".to_string(), format!("{:.2}", order.total));
    let signature = compute_signature(fields.iter(), "secret");
    fields.insert("signature".to_string(), signature);

    // Deliver the same notification from 6 tasks at once
    let mut handles = Vec::new();
    for _ in 0..6 {
        let state = state.clone();
        let fields = fields.clone();
        handles.push(tokio::spawn(
            async move { state.reconciler.notify(fields).await },
        ));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(NotifyOutcome::Applied { .. }) => applied += 1,
            // Losers observe either the finished record or the in-flight one
            Ok(NotifyOutcome::AlreadyProcessed) | Ok(NotifyOutcome::Rejected { .. }) => {}
            Err(err) => panic!("unexpected error: {}", err),
        }
    }
    assert_eq!(applied, 1);

    // And a late replay is a clean no-op
    let late = state.reconciler.notify(fields).await.unwrap();
    assert_eq!(late, NotifyOutcome::AlreadyProcessed);

    // Exactly one payment row, one transition, one reservation
    let order = state.orders.get_order(&order.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payments.len(), 1);
    let sku = state.ledger.get_sku("sku-1").unwrap().unwrap();
    assert_eq!(sku.reserved_quantity, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_processing_applies_once() {
    let state = Arc::new(test_state().await);
    seed_sku(&state, "sku-1", 5);

    let cart = vec![cart_row("user-1", 2)];
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
    state
        .orders
        .process_payment_success(&order.order_id, "pf-1", order.total, "GATEWAY", "ZAR")
        .await
        .unwrap();

    // Many workers race to start processing the same order
    let mut handles = Vec::new();
    for _ in 0..6 {
        let state = state.clone();
        let order_id = order.order_id.clone();
        handles.push(tokio::spawn(async move {
            state.orders.start_processing(&order_id).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            // Losers retried against fresh state and found the transition
            // already taken, or exhausted their retries
            Err(OrderError::InvalidOrderState(_)) | Err(OrderError::ConcurrencyConflict(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(successes, 1);

    // Allocation happened exactly once: no double deduction
    let sku = state.ledger.get_sku("sku-1").unwrap().unwrap();
    assert_eq!(sku.stock_quantity, 3);
    assert_eq!(sku.reserved_quantity, 0);

    let order = state.orders.get_order(&order.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}
