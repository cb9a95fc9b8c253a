//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! Domain failures carry a machine-readable [`ErrorCode`] so callers can
//! branch without parsing messages; 5xx bodies never leak internals.
//!
//! # 使用示例
//!
//! ```ignore
//! // 返回错误
//! Err(AppError::domain(ErrorCode::OrderNotFound, "Order not found"))
//!
//! // 返回成功响应
//! Ok(ok(data))
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ErrorCode;
use tracing::error;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "OK",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码 ("OK" 表示成功)
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Typed domain-rule violation (stock, state machine, credit, session)
    #[error("{message}")]
    Domain { code: ErrorCode, message: String },

    /// Malformed or unresolvable request input (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 数据库错误 (500)
    #[error("Database error: {0}")]
    Database(String),

    /// 内部错误 (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn domain(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Domain {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Domain {
            code: ErrorCode::OrderNotFound,
            message: format!("{} not found", what),
        }
    }
}

/// HTTP status for a domain error code
fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::OrderNotFound
        | ErrorCode::ProductNotFound
        | ErrorCode::CartItemNotFound
        | ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
        ErrorCode::SessionExpired => StatusCode::GONE,
        ErrorCode::InvalidOrderState
        | ErrorCode::ConcurrencyConflict
        | ErrorCode::DuplicateRequest => StatusCode::CONFLICT,
        ErrorCode::InvalidQuantity
        | ErrorCode::InvalidPaymentAmount
        | ErrorCode::EmptyCart => StatusCode::BAD_REQUEST,
        ErrorCode::InsufficientStock
        | ErrorCode::ProductInactive
        | ErrorCode::CreditNoteInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::SystemError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Domain { code, message } => {
                (status_for(*code), format!("{:?}", ErrorCodeWire(*code)), message.clone())
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                msg.clone(),
            ),
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR".to_string(),
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR".to_string(),
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code,
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

/// Render an ErrorCode as its SCREAMING_SNAKE_CASE wire token
struct ErrorCodeWire(ErrorCode);

impl std::fmt::Debug for ErrorCodeWire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // serde already owns the canonical wire spelling
        let token = serde_json::to_string(&self.0).unwrap_or_else(|_| "\"SYSTEM_ERROR\"".into());
        write!(f, "{}", token.trim_matches('"'))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::not_found("Row"),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// 处理器的 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "OK".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
