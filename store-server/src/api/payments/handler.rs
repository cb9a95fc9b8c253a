//! Payments API Handlers
//!
//! Outbound: builds the signed redirect payload for the gateway's hosted
//! page. Inbound: the webhook endpoint — urlencoded form, 200 for accepted
//! or idempotent deliveries, 400 with a reason for rejects.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

use crate::core::ServerState;
use crate::payment::{NotifyOutcome, PaymentRequest};
use crate::utils::{ok, AppError, AppResponse, AppResult};

#[derive(Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub return_url: String,
    #[validate(length(min = 1))]
    pub cancel_url: String,
    #[validate(length(min = 1))]
    pub notify_url: String,
}

/// POST /api/payments/request - 构建签名跳转载荷
pub async fn create_payment_request(
    State(state): State<ServerState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<AppResponse<PaymentRequest>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let order = state.orders.get_order(&payload.order_id)?;
    let request = PaymentRequest::build(
        &order,
        &payload.return_url,
        &payload.cancel_url,
        &payload.notify_url,
        &state.config.gateway,
    );
    Ok(ok(request))
}

/// POST /api/payments/notify - 网关回调 (application/x-www-form-urlencoded)
///
/// 200 仅用于已接受或幂等重放的投递；拒绝一律 400 并附原因，
/// 让网关可以重试或报警。
pub async fn notify(
    State(state): State<ServerState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    match state.reconciler.notify(fields).await {
        Ok(NotifyOutcome::Rejected { reason }) => {
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        Ok(_) => (StatusCode::OK, "OK".to_string()).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Payment notification processing failed");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}
