//! Engine-level traits, context and error type
//!
//! Every workflow operation is an action implementing [`CommandHandler`];
//! the manager runs it inside one redb write transaction through a
//! [`CommandContext`].

use async_trait::async_trait;
use redb::WriteTransaction;
use shared::order::Order;
use shared::ErrorCode;
use thiserror::Error;

use super::storage::{LedgerStorage, StorageError};
use crate::services::notifier::DomainEvent;
use crate::utils::AppError;

/// Engine error — every variant maps onto a wire [`ErrorCode`]
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid order state: {0}")]
    InvalidOrderState(String),

    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: String,
        requested: i64,
        available: i64,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Product is not active: {0}")]
    ProductInactive(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    #[error("Credit note invalid: {0}")]
    CreditNoteInvalid(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Checkout session expired: {0}")]
    SessionExpired(String),

    #[error("Shipping address not found: {0}")]
    AddressNotFound(String),

    #[error("Concurrent modification of order {0}")]
    ConcurrencyConflict(String),

    #[error("Duplicate request: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Machine-readable code surfaced at the API boundary
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::InvalidOrderState(_) => ErrorCode::InvalidOrderState,
            OrderError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            OrderError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            OrderError::ProductInactive(_) => ErrorCode::ProductInactive,
            OrderError::EmptyCart => ErrorCode::EmptyCart,
            OrderError::CartItemNotFound(_) => ErrorCode::CartItemNotFound,
            OrderError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            OrderError::InvalidPaymentAmount(_) => ErrorCode::InvalidPaymentAmount,
            OrderError::CreditNoteInvalid(_) => ErrorCode::CreditNoteInvalid,
            OrderError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            OrderError::SessionExpired(_) => ErrorCode::SessionExpired,
            OrderError::AddressNotFound(_) => ErrorCode::SystemError,
            OrderError::ConcurrencyConflict(_) => ErrorCode::ConcurrencyConflict,
            OrderError::Duplicate(_) => ErrorCode::DuplicateRequest,
            OrderError::Storage(_) | OrderError::Internal(_) => ErrorCode::SystemError,
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::AddressNotFound(msg) => {
                AppError::Validation(format!("Shipping address not found: {}", msg))
            }
            OrderError::Storage(e) => AppError::Database(e.to_string()),
            OrderError::Internal(msg) => AppError::Internal(msg),
            other => {
                let code = other.code();
                AppError::domain(code, other.to_string())
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Database(err.to_string())
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

/// Per-command execution context: one write transaction over the ledger
pub struct CommandContext<'a> {
    txn: &'a WriteTransaction,
    storage: &'a LedgerStorage,
    /// Wall-clock millis fixed at command start
    pub now: i64,
}

impl<'a> CommandContext<'a> {
    pub fn new(txn: &'a WriteTransaction, storage: &'a LedgerStorage, now: i64) -> Self {
        Self { txn, storage, now }
    }

    pub fn txn(&self) -> &'a WriteTransaction {
        self.txn
    }

    pub fn storage(&self) -> &'a LedgerStorage {
        self.storage
    }

    /// Load an order, mapping absence to the engine error
    pub fn load_order(&self, order_id: &str) -> OrderResult<Order> {
        match self.storage.try_load_order(self.txn, order_id)? {
            Some(order) => Ok(order),
            None => Err(OrderError::OrderNotFound(order_id.to_string())),
        }
    }

    /// Persist an order, stamping `updated_at` and bumping `version`
    pub fn store_order(&self, order: &mut Order) -> OrderResult<()> {
        order.version += 1;
        order.updated_at = self.now;
        self.storage.store_order(self.txn, order)?;
        Ok(())
    }
}

/// Outcome of a workflow action: the updated order plus the domain events
/// to broadcast after the transaction commits.
pub struct ActionOutcome {
    pub order: Order,
    pub events: Vec<DomainEvent>,
}

impl ActionOutcome {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            events: Vec::new(),
        }
    }

    pub fn with_event(order: Order, event: DomainEvent) -> Self {
        Self {
            order,
            events: vec![event],
        }
    }
}

/// A workflow operation executed inside one write transaction
#[async_trait]
pub trait CommandHandler: Sync {
    async fn execute(&self, ctx: &CommandContext<'_>) -> OrderResult<ActionOutcome>;
}
