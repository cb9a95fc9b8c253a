//! Shipping fee table
//!
//! Deterministic table keyed by province for delivery; pickup is always
//! free. Orders at or above the free-shipping threshold ship free. The
//! table is hardcoded observed behaviour, not configuration.

use rust_decimal::Decimal;
use shared::order::FulfilmentMethod;

use super::money::{to_decimal, to_f64};

/// Subtotal at or above which delivery is free
pub const FREE_SHIPPING_THRESHOLD: f64 = 1500.0;

/// Fallback fee for provinces not in the table
const DEFAULT_PROVINCE_FEE: f64 = 169.0;

/// Per-province delivery fees (ZAR)
const PROVINCE_FEES: &[(&str, f64)] = &[
    ("GAUTENG", 99.0),
    ("WESTERN_CAPE", 129.0),
    ("KWAZULU_NATAL", 129.0),
    ("EASTERN_CAPE", 149.0),
];

/// Delivery fee for a province, before the free-shipping threshold
fn province_fee(province: &str) -> f64 {
    let key = province.trim().to_uppercase().replace([' ', '-'], "_");
    PROVINCE_FEES
        .iter()
        .find(|(p, _)| *p == key)
        .map(|(_, fee)| *fee)
        .unwrap_or(DEFAULT_PROVINCE_FEE)
}

/// Shipping fee for an order
pub fn shipping_fee(method: FulfilmentMethod, province: Option<&str>, subtotal: Decimal) -> Decimal {
    match method {
        FulfilmentMethod::Pickup => Decimal::ZERO,
        FulfilmentMethod::Delivery => {
            if to_f64(subtotal) >= FREE_SHIPPING_THRESHOLD {
                return Decimal::ZERO;
            }
            let province = province.unwrap_or("");
            to_decimal(province_fee(province))
        }
    }
}
