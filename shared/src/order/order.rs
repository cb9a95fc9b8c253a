//! Order aggregate root
//!
//! The order owns its items, payments, optional shipment and optional pickup
//! OTP. It is created once at checkout completion and afterwards mutated only
//! through validated state transitions; cancellation is a status, never a
//! delete.

use serde::{Deserialize, Serialize};

use super::types::{
    FulfilmentMethod, ItemStatus, OrderStatus, OtpStatus, PaymentStatus, ShipmentStatus,
};
use crate::models::Address;

/// A single order line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// SKU ID
    pub sku_id: String,
    /// Product name snapshot (survives catalog edits)
    pub name: String,
    /// Quantity
    pub quantity: i32,
    /// Unit price captured at order creation
    pub unit_price: f64,
    /// Line total (unit_price * quantity)
    pub line_total: f64,
    /// Item status
    #[serde(default)]
    pub status: ItemStatus,
}

/// One payment attempt/record. Refunds are negative-amount records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub method: String,
    /// Signed amount; negative for refunds
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    /// External transaction id — unique across all payments (idempotency key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
}

/// Shipment record (zero-or-one per order, DELIVERY only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Shipment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub status: ShipmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_of_delivery: Option<String>,
}

/// One-time code for in-store pickup (zero-or-one per order, PICKUP only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupOtp {
    /// 6-digit code
    pub code: String,
    pub status: OtpStatus,
    pub issued_at: i64,
    /// issued_at + 72h
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by_staff: Option<String>,
}

impl PickupOtp {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    /// Human-readable order number, globally unique
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub fulfilment: FulfilmentMethod,

    // === Monetary breakdown (all non-negative, 2dp) ===
    pub subtotal: f64,
    pub tax: f64,
    pub shipping_fee: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub credit_note_amount: f64,
    /// subtotal + tax + shipping - discount - credit_note_amount, clamped >= 0
    pub total: f64,

    /// Address snapshot; required for DELIVERY, absent for PICKUP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    /// Append-only audit notes
    #[serde(default)]
    pub notes: Vec<String>,

    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<Shipment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_otp: Option<PickupOtp>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,

    /// Optimistic-concurrency counter, bumped on every committed mutation
    #[serde(default)]
    pub version: u64,

    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    pub updated_at: i64,
}

impl Order {
    /// Append an audit note
    pub fn append_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Find a payment by external transaction id
    pub fn payment_by_txn(&self, txn_id: &str) -> Option<&PaymentRecord> {
        self.payments
            .iter()
            .find(|p| p.txn_id.as_deref() == Some(txn_id))
    }

    /// Set every item to the given status
    pub fn set_item_statuses(&mut self, status: ItemStatus) {
        for item in &mut self.items {
            item.status = status;
        }
    }
}
