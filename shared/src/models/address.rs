//! Shipping address model

use serde::{Deserialize, Serialize};

/// Shipping address. Resolution is always ownership-checked against the
/// requesting user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Address {
    /// Public identifier handed to clients
    pub public_id: String,
    pub user_id: String,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    /// Province key for the shipping-fee table (e.g. "GAUTENG")
    pub province: String,
    pub postal_code: String,
}

/// Address creation payload (seeding/tests)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressCreate {
    pub user_id: String,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}
