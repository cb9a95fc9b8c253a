//! Cart API Handlers
//!
//! The storefront cart surface. Quantities are re-checked against current
//! stock at every write, not just at render time.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::{ok, AppError, AppResponse, AppResult};
use shared::models::CartItem;

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub sku_id: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// GET /api/cart?user_id= - 获取购物车
pub async fn get_cart(
    State(state): State<ServerState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<AppResponse<Vec<CartItem>>>> {
    let rows = state.cart.get_cart(&query.user_id).await?;
    Ok(ok(rows))
}

/// POST /api/cart - 加入购物车
pub async fn add_item(
    State(state): State<ServerState>,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<Json<AppResponse<CartItem>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let row = state
        .cart
        .add_item(&payload.user_id, &payload.sku_id, payload.quantity)
        .await?;
    Ok(ok(row))
}

/// PUT /api/cart/items/:sku_id - 更新数量
pub async fn update_quantity(
    State(state): State<ServerState>,
    Path(sku_id): Path<String>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<AppResponse<CartItem>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let row = state
        .cart
        .update_quantity(&payload.user_id, &sku_id, payload.quantity)
        .await?;
    Ok(ok(row))
}

/// DELETE /api/cart/items/:sku_id?user_id= - 移除商品
pub async fn remove_item(
    State(state): State<ServerState>,
    Path(sku_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<AppResponse<bool>>> {
    state.cart.remove_item(&query.user_id, &sku_id).await?;
    Ok(ok(true))
}
