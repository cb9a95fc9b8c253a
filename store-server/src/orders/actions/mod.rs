//! Workflow action implementations
//!
//! Each action implements the `CommandHandler` trait and performs one
//! validated state transition together with its side effects, inside the
//! write transaction the manager provides.

mod cancel;
mod create_order;
mod deliver;
mod payment_success;
mod pickup;
mod refund;
mod ship;
mod start_processing;

pub use cancel::CancelAction;
pub use create_order::CreateOrderAction;
pub use deliver::DeliverAction;
pub use payment_success::PaymentSuccessAction;
pub use pickup::{GeneratePickupOtpAction, ProcessPickupAction};
pub use refund::RefundAction;
pub use ship::ShipAction;
pub use start_processing::StartProcessingAction;
