//! Payment gateway adapter and webhook reconciliation
//!
//! - [`gateway`] — outbound signed redirect payloads, signature verification
//! - [`webhook`] — inbound notification validation and idempotent
//!   payment-to-order reconciliation
//! - [`envelope`] — durable at-least-once-delivery / at-most-once-effect
//!   wrapper with bounded exponential-backoff retries

pub mod envelope;
pub mod gateway;
pub mod webhook;

pub use gateway::{GatewayConfig, PaymentRequest};
pub use webhook::{NotifyOutcome, WebhookReconciler};
