//! Inventory unit tracked by the stock ledger

use serde::{Deserialize, Serialize};

/// Inventory unit.
///
/// Invariant: `0 <= reserved_quantity <= stock_quantity` at all times;
/// `available()` never goes negative as a result of any ledger operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sku {
    pub sku_id: String,
    pub name: String,
    pub price: f64,
    /// On-hand units
    pub stock_quantity: i64,
    /// Soft-locked / allocated-pending-fulfilment units
    #[serde(default)]
    pub reserved_quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub updated_at: i64,
}

fn default_active() -> bool {
    true
}

impl Sku {
    /// Units available for a new cart addition or order
    pub fn available(&self) -> i64 {
        self.stock_quantity - self.reserved_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available() {
        let sku = Sku {
            sku_id: "sku-1".to_string(),
            name: "Widget".to_string(),
            price: 100.0,
            stock_quantity: 5,
            reserved_quantity: 2,
            low_stock_threshold: 1,
            active: true,
            updated_at: 0,
        };
        assert_eq!(sku.available(), 3);
    }
}
