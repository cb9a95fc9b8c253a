//! Checkout API Handlers
//!
//! The conceptual RPC surface of the checkout engine: session lifecycle,
//! credit-note validation, shipping quotes and order completion.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::checkout::CompleteOrderRequest;
use crate::core::ServerState;
use crate::orders::money::{to_decimal, to_f64};
use crate::orders::shipping::shipping_fee;
use crate::utils::{ok, AppError, AppResponse, AppResult};
use shared::checkout::CheckoutSession;
use shared::credit::CreditNote;
use shared::order::{FulfilmentMethod, Order};

#[derive(Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub credit_note_code: Option<String>,
    #[validate(range(min = 0.01))]
    pub credit_amount: Option<f64>,
}

/// POST /api/checkout/sessions - 创建结账会话
pub async fn create_session(
    State(state): State<ServerState>,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<Json<AppResponse<CheckoutSession>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let cart = state.cart.get_cart(&payload.user_id).await?;
    let session = state.checkout.create(
        &payload.user_id,
        &cart,
        payload.credit_note_code.as_deref(),
        payload.credit_amount,
    )?;
    Ok(ok(session))
}

/// GET /api/checkout/sessions/:id - 获取会话 (惰性过期)
pub async fn get_session(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<CheckoutSession>>> {
    let session = state.checkout.get(&id)?;
    Ok(ok(session))
}

/// DELETE /api/checkout/sessions/:id - 释放会话持有的所有锁
pub async fn release_session(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<CheckoutSession>>> {
    let session = state.checkout.release(&id)?;
    Ok(ok(session))
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub fulfilment: FulfilmentMethod,
    /// Required for DELIVERY, resolved with ownership check
    pub address_id: Option<String>,
    pub note: Option<String>,
}

/// POST /api/checkout/sessions/:id/complete - 完成结账，创建订单
pub async fn complete_order(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<CompleteRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    // Lazy-expiry check happens here; an expired session rejects before
    // any collaborator reads
    let session = state.checkout.get(&id)?;

    let shipping_address = match (payload.fulfilment, &payload.address_id) {
        (FulfilmentMethod::Delivery, Some(address_id)) => {
            Some(state.addresses.resolve(address_id, &session.user_id).await?)
        }
        (FulfilmentMethod::Delivery, None) => {
            return Err(AppError::validation(
                "delivery orders require an address_id",
            ))
        }
        (FulfilmentMethod::Pickup, _) => None,
    };

    let cart = state.cart.get_cart(&session.user_id).await?;
    let order = state
        .checkout
        .complete_order(
            &id,
            CompleteOrderRequest {
                fulfilment: payload.fulfilment,
                shipping_address,
                cart,
                note: payload.note,
            },
        )
        .await?;

    // Cart is collaborator state; clearing it is best-effort after the
    // order committed
    if let Err(e) = state.cart.clear_cart(&session.user_id).await {
        tracing::warn!(
            user_id = %session.user_id,
            error = %e,
            "Failed to clear cart after checkout"
        );
    }

    Ok(ok(order))
}

#[derive(Deserialize, Validate)]
pub struct ValidateCreditRequest {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 0.01))]
    pub amount: f64,
}

#[derive(Serialize)]
pub struct ValidateCreditResponse {
    pub note: CreditNote,
    pub applicable_amount: f64,
}

/// POST /api/checkout/credit-notes/validate - 验证抵扣券
pub async fn validate_credit_note(
    State(state): State<ServerState>,
    Json(payload): Json<ValidateCreditRequest>,
) -> AppResult<Json<AppResponse<ValidateCreditResponse>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let (note, applicable_amount) =
        state
            .checkout
            .validate_credit_note(&payload.code, &payload.user_id, payload.amount)?;
    Ok(ok(ValidateCreditResponse {
        note,
        applicable_amount,
    }))
}

#[derive(Deserialize)]
pub struct ShippingQuery {
    pub method: FulfilmentMethod,
    pub address_id: Option<String>,
    pub user_id: String,
}

#[derive(Serialize)]
pub struct ShippingQuote {
    pub fee: f64,
    pub subtotal: f64,
}

/// GET /api/checkout/shipping - 运费报价 (按省份表，满额免运费)
pub async fn shipping_quote(
    State(state): State<ServerState>,
    Query(query): Query<ShippingQuery>,
) -> AppResult<Json<AppResponse<ShippingQuote>>> {
    let province = match (query.method, &query.address_id) {
        (FulfilmentMethod::Delivery, Some(address_id)) => Some(
            state
                .addresses
                .resolve(address_id, &query.user_id)
                .await?
                .province,
        ),
        (FulfilmentMethod::Delivery, None) => {
            return Err(AppError::validation(
                "delivery quotes require an address_id",
            ))
        }
        (FulfilmentMethod::Pickup, _) => None,
    };

    // Quote against the current cart content at current prices
    let cart = state.cart.get_cart(&query.user_id).await?;
    let mut subtotal = rust_decimal::Decimal::ZERO;
    for row in &cart {
        if let Some(sku) = state.ledger.get_sku(&row.sku_id)? {
            subtotal += to_decimal(sku.price) * rust_decimal::Decimal::from(row.quantity);
        }
    }

    let fee = shipping_fee(query.method, province.as_deref(), subtotal);
    Ok(ok(ShippingQuote {
        fee: to_f64(fee),
        subtotal: to_f64(subtotal),
    }))
}
