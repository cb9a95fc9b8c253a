//! Credit note API Handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::credit;
use crate::services::notifier::DomainEvent;
use crate::utils::{ok, AppError, AppResponse, AppResult};
use shared::credit::CreditNote;
use shared::util::{now_millis, HOUR_MS};

/// Default validity when the issuer does not specify one
const DEFAULT_VALIDITY_DAYS: i64 = 365;

#[derive(Deserialize, Validate)]
pub struct IssueRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    #[validate(range(min = 1))]
    pub validity_days: Option<i64>,
    /// Trade-in reference that produced this note
    pub source_reference: Option<String>,
}

/// POST /api/credit-notes - 签发抵扣券 (以旧换新受理入口)
pub async fn issue(
    State(state): State<ServerState>,
    Json(payload): Json<IssueRequest>,
) -> AppResult<Json<AppResponse<CreditNote>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let validity_ms = payload.validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS) * 24 * HOUR_MS;
    let txn = state.ledger.begin_write()?;
    let note = credit::issue(
        &state.ledger,
        &txn,
        &payload.user_id,
        payload.amount,
        validity_ms,
        payload.source_reference,
        now_millis(),
    )?;
    txn.commit().map_err(crate::orders::StorageError::from)?;

    state.notifier.publish(DomainEvent::CreditIssued {
        code: note.code.clone(),
        user_id: note.user_id.clone(),
        amount: note.amount,
    });
    Ok(ok(note))
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub user_id: String,
}

/// GET /api/credit-notes/:code?user_id= - 查询 (仅持有人可见)
pub async fn get_by_code(
    State(state): State<ServerState>,
    Path(code): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<Json<AppResponse<CreditNote>>> {
    let note = state
        .ledger
        .get_credit_note(&code)?
        .filter(|n| n.user_id == query.user_id)
        .ok_or_else(|| {
            AppError::domain(
                shared::ErrorCode::CreditNoteInvalid,
                format!("credit note {} not found", code),
            )
        })?;
    Ok(ok(note))
}

#[derive(Deserialize, Validate)]
pub struct CancelNoteRequest {
    #[validate(length(min = 1))]
    pub reason: String,
}

/// POST /api/credit-notes/:code/cancel - 作废 (已用尽的不可作废)
pub async fn cancel(
    State(state): State<ServerState>,
    Path(code): Path<String>,
    Json(payload): Json<CancelNoteRequest>,
) -> AppResult<Json<AppResponse<CreditNote>>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let txn = state.ledger.begin_write()?;
    let note = credit::cancel(&state.ledger, &txn, &code, &payload.reason)?;
    txn.commit().map_err(crate::orders::StorageError::from)?;
    Ok(ok(note))
}

#[derive(Serialize)]
pub struct SweepResult {
    pub expired: usize,
}

/// POST /api/admin/sweeps/credit-notes - 批量过期 (外部调度器调用)
pub async fn expire_sweep(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<SweepResult>>> {
    let txn = state.ledger.begin_write()?;
    let expired = credit::expire_sweep(&state.ledger, &txn, now_millis())?;
    txn.commit().map_err(crate::orders::StorageError::from)?;
    Ok(ok(SweepResult { expired }))
}

#[derive(Serialize)]
pub struct WebhookSweepResult {
    pub succeeded: usize,
    pub still_failing: usize,
}

/// POST /api/admin/sweeps/webhooks - 重试到期的失败投递
pub async fn webhook_sweep(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<WebhookSweepResult>>> {
    let (succeeded, still_failing) = state.reconciler.retry_sweep().await?;
    Ok(ok(WebhookSweepResult {
        succeeded,
        still_failing,
    }))
}
