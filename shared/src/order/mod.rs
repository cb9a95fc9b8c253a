//! Order aggregate and its wire types

mod order;
pub mod types;

pub use order::{Order, OrderItem, PaymentRecord, PickupOtp, Shipment};
pub use types::{
    FulfilmentMethod, ItemStatus, OrderAction, OrderStatus, OtpStatus, PaymentOutcome,
    PaymentStatus, ShipmentStatus,
};
