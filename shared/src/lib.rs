//! Shared types for the storefront order engine
//!
//! Domain types used by both the server and any in-process clients:
//! order aggregates, checkout sessions, credit notes, stock units,
//! webhook records, error codes and small utilities.

pub mod checkout;
pub mod credit;
pub mod error;
pub mod models;
pub mod order;
pub mod stock;
pub mod util;
pub mod webhook;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCode;
pub use order::{FulfilmentMethod, ItemStatus, Order, OrderItem, OrderStatus, PaymentStatus};
