//! Cart row models

use serde::{Deserialize, Serialize};

/// One cart row per (user, SKU)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CartItem {
    pub user_id: String,
    pub sku_id: String,
    pub quantity: i32,
    pub created_at: i64,
    pub updated_at: i64,
}
