//! Machine-readable error codes shared across the wire boundary
//!
//! The server attaches one of these codes to every structured failure so
//! clients can branch without parsing human-readable messages.

use serde::{Deserialize, Serialize};

/// Domain error codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidQuantity,
    ProductNotFound,
    ProductInactive,
    InsufficientStock,
    CartItemNotFound,
    EmptyCart,
    InvalidOrderState,
    OrderNotFound,
    InvalidPaymentAmount,
    ConcurrencyConflict,
    SystemError,
    SessionNotFound,
    SessionExpired,
    CreditNoteInvalid,
    DuplicateRequest,
}

/// Structured failure body carried in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
