//! SKU / stock API Handlers
//!
//! Admin/seeding surface for the stock ledger. Customer-facing catalog
//! browsing lives elsewhere; this is just enough to manage inventory.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::stock;
use crate::utils::{ok, AppError, AppResponse, AppResult};
use shared::stock::Sku;
use shared::util::now_millis;

/// GET /api/skus - 全部库存单位
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<AppResponse<Vec<Sku>>>> {
    let skus = state.ledger.list_skus()?;
    Ok(ok(skus))
}

/// GET /api/skus/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Sku>>> {
    let sku = state.ledger.get_sku(&id)?.ok_or_else(|| {
        AppError::domain(
            shared::ErrorCode::ProductNotFound,
            format!("SKU {} not found", id),
        )
    })?;
    Ok(ok(sku))
}

#[derive(Deserialize, Validate)]
pub struct UpsertSkuRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0))]
    pub stock_quantity: i64,
    #[validate(range(min = 0))]
    pub low_stock_threshold: i64,
    pub active: bool,
}

/// PUT /api/skus/:id - 创建或替换库存单位
///
/// Reservations survive the upsert; an existing SKU keeps its reserved
/// quantity, and the invariant `reserved <= stock` is still enforced.
pub async fn upsert(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpsertSkuRequest>,
) -> AppResult<Json<AppResponse<Sku>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let txn = state.ledger.begin_write()?;
    let reserved_quantity = state
        .ledger
        .try_load_sku(&txn, &id)?
        .map(|existing| existing.reserved_quantity)
        .unwrap_or(0);
    let sku = Sku {
        sku_id: id,
        name: payload.name,
        price: payload.price,
        stock_quantity: payload.stock_quantity,
        reserved_quantity,
        low_stock_threshold: payload.low_stock_threshold,
        active: payload.active,
        updated_at: now_millis(),
    };
    stock::upsert_sku(&state.ledger, &txn, &sku)?;
    txn.commit().map_err(crate::orders::StorageError::from)?;
    Ok(ok(sku))
}

#[derive(Deserialize, Validate)]
pub struct AdjustStockRequest {
    /// Signed delta: goods received or corrections
    #[validate(range(min = -99999, max = 99999))]
    pub delta: i64,
}

/// POST /api/skus/:id/adjust - 调整在库数量
pub async fn adjust(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<AppResponse<Sku>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let txn = state.ledger.begin_write()?;
    let sku = stock::adjust_stock(&state.ledger, &txn, &id, payload.delta, now_millis())?;
    txn.commit().map_err(crate::orders::StorageError::from)?;
    Ok(ok(sku))
}
