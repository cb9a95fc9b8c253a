//! Orders API Handlers
//!
//! Fulfilment workflow operations. Each handler is a thin shim over the
//! order manager; validation and state-machine checks live in the engine.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::{ok, AppError, AppResponse, AppResult};
use shared::order::{Order, OrderAction};

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// GET /api/orders?user_id= - 用户订单列表 (最新在前)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = state.orders.list_orders(&query.user_id)?;
    Ok(ok(orders))
}

/// GET /api/orders/:id - 订单详情
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.orders.get_order(&id)?;
    Ok(ok(order))
}

/// GET /api/orders/:id/actions - 当前可执行的工作流操作
pub async fn available_actions(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Vec<OrderAction>>>> {
    let actions = state.orders.available_actions(&id)?;
    Ok(ok(actions))
}

/// POST /api/orders/:id/process - PAID → PROCESSING
pub async fn start_processing(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.orders.start_processing(&id).await?;
    Ok(ok(order))
}

#[derive(Deserialize, Validate)]
pub struct ShipRequest {
    #[validate(length(min = 1))]
    pub courier: String,
    pub tracking_number: Option<String>,
}

/// POST /api/orders/:id/ship - PROCESSING → SHIPPED
pub async fn ship(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ShipRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state
        .orders
        .ship(&id, &payload.courier, payload.tracking_number)
        .await?;
    Ok(ok(order))
}

#[derive(Deserialize, Default)]
pub struct DeliverRequest {
    pub proof_of_delivery: Option<String>,
}

/// POST /api/orders/:id/deliver - → DELIVERED
pub async fn deliver(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<DeliverRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.orders.deliver(&id, payload.proof_of_delivery).await?;
    Ok(ok(order))
}

#[derive(Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(min = 1))]
    pub reason: String,
}

/// POST /api/orders/:id/cancel - 取消 (24 小时窗口内)
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state.orders.cancel(&id, &payload.reason).await?;
    Ok(ok(order))
}

#[derive(Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 0.01))]
    pub amount: f64,
    #[validate(length(min = 1))]
    pub reason: String,
}

/// POST /api/orders/:id/refund - DELIVERED|CANCELLED → REFUNDED
pub async fn refund(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<RefundRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state
        .orders
        .refund(&id, payload.amount, &payload.reason)
        .await?;
    Ok(ok(order))
}

/// POST /api/orders/:id/pickup-otp - 生成 (或返回现有) 取货码
pub async fn generate_pickup_otp(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.orders.generate_pickup_otp(&id).await?;
    Ok(ok(order))
}

#[derive(Deserialize, Validate)]
pub struct ProcessPickupRequest {
    #[validate(length(equal = 6))]
    pub otp_code: String,
    #[validate(length(min = 1))]
    pub staff_id: String,
}

/// POST /api/orders/:id/pickup - 验证取货码并交付
pub async fn process_pickup(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProcessPickupRequest>,
) -> AppResult<Json<AppResponse<Order>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state
        .orders
        .process_pickup(&id, &payload.otp_code, &payload.staff_id)
        .await?;
    Ok(ok(order))
}
