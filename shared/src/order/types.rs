//! Status enums and small wire types for the order lifecycle

use serde::{Deserialize, Serialize};

// ============================================================================
// Order Status
// ============================================================================

/// 订单状态
///
/// Legal transitions are enforced by the server's state machine; this enum
/// is purely the wire/storage representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 待支付 - created at checkout, awaiting payment
    #[default]
    Pending,
    /// 已支付 - payment confirmed, stock reserved
    Paid,
    /// 处理中 - stock allocated, shipment/OTP prepared
    Processing,
    /// 已发货
    Shipped,
    /// 已送达 / 已取货
    Delivered,
    /// 已取消
    Cancelled,
    /// 已退款 (terminal)
    Refunded,
}

/// Item-level status (mirrors a subset of the order status)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Pending,
    /// Payment confirmed, units reserved
    Confirmed,
    /// Units allocated out of on-hand stock
    Fulfilled,
    Cancelled,
}

/// 履约方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfilmentMethod {
    /// 快递配送
    #[default]
    Delivery,
    /// 门店自提
    Pickup,
}

// ============================================================================
// Payment
// ============================================================================

/// Payment record status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

/// Gateway-reported payment outcome (webhook `payment_status` field)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Complete,
    Failed,
    Cancelled,
    Pending,
}

impl PaymentOutcome {
    /// Parse the gateway's uppercase wire value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "COMPLETE" => Some(Self::Complete),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            "PENDING" => Some(Self::Pending),
            _ => None,
        }
    }
}

// ============================================================================
// Fulfilment records
// ============================================================================

/// Shipment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    #[default]
    Preparing,
    InTransit,
    Delivered,
    Cancelled,
}

/// Pickup OTP status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    #[default]
    Active,
    Used,
    Expired,
}

// ============================================================================
// Workflow actions
// ============================================================================

/// Orchestration operations legally callable next for an order.
///
/// Returned by the available-actions query so UIs never re-derive the
/// transition table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    StartProcessing,
    Ship,
    Deliver,
    Cancel,
    Refund,
    GeneratePickupOtp,
    ProcessPickup,
}
