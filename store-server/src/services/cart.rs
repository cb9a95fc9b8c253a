//! Cart service
//!
//! Thin collaborator surface over the SQLite cart rows. Every write
//! re-checks availability against the stock ledger at write time — the
//! render-time number a customer saw is never trusted. The authoritative
//! check still happens again at order creation; this one just keeps carts
//! honest under concurrent shoppers.

use sqlx::SqlitePool;

use crate::db::repository::cart;
use crate::orders::money::validate_quantity;
use crate::orders::storage::LedgerStorage;
use crate::orders::traits::{OrderError, OrderResult};
use shared::models::CartItem;
use shared::stock::Sku;

/// Cart operations for the excluded storefront
#[derive(Clone)]
pub struct CartService {
    pool: SqlitePool,
    ledger: LedgerStorage,
}

impl CartService {
    pub fn new(pool: SqlitePool, ledger: LedgerStorage) -> Self {
        Self { pool, ledger }
    }

    pub async fn get_cart(&self, user_id: &str) -> OrderResult<Vec<CartItem>> {
        Ok(cart::find_by_user(&self.pool, user_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?)
    }

    /// Add units of a SKU, checking the ledger's current availability
    /// against the cart's total quantity for that SKU.
    pub async fn add_item(
        &self,
        user_id: &str,
        sku_id: &str,
        quantity: i32,
    ) -> OrderResult<CartItem> {
        validate_quantity(quantity)?;
        let sku = self.active_sku(sku_id)?;

        let already_in_cart = cart::find_item(&self.pool, user_id, sku_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?
            .map(|row| row.quantity)
            .unwrap_or(0);
        let wanted = i64::from(already_in_cart) + i64::from(quantity);
        self.check_available(&sku, wanted)?;

        let row = cart::upsert_item(&self.pool, user_id, sku_id, quantity)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        tracing::debug!(user_id = %user_id, sku_id = %sku_id, quantity, "Cart item added");
        Ok(row)
    }

    /// Replace the quantity of an existing cart row
    pub async fn update_quantity(
        &self,
        user_id: &str,
        sku_id: &str,
        quantity: i32,
    ) -> OrderResult<CartItem> {
        validate_quantity(quantity)?;
        let sku = self.active_sku(sku_id)?;
        self.check_available(&sku, i64::from(quantity))?;

        let updated = cart::set_quantity(&self.pool, user_id, sku_id, quantity)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        if !updated {
            return Err(OrderError::CartItemNotFound(sku_id.to_string()));
        }
        cart::find_item(&self.pool, user_id, sku_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?
            .ok_or_else(|| OrderError::CartItemNotFound(sku_id.to_string()))
    }

    pub async fn remove_item(&self, user_id: &str, sku_id: &str) -> OrderResult<()> {
        let removed = cart::remove_item(&self.pool, user_id, sku_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        if !removed {
            return Err(OrderError::CartItemNotFound(sku_id.to_string()));
        }
        Ok(())
    }

    /// Empty the cart. Best-effort after checkout; callers log failures
    /// rather than propagate them.
    pub async fn clear_cart(&self, user_id: &str) -> OrderResult<u64> {
        cart::clear(&self.pool, user_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }

    fn active_sku(&self, sku_id: &str) -> OrderResult<Sku> {
        let sku = self
            .ledger
            .get_sku(sku_id)?
            .ok_or_else(|| OrderError::ProductNotFound(sku_id.to_string()))?;
        if !sku.active {
            return Err(OrderError::ProductInactive(sku_id.to_string()));
        }
        Ok(sku)
    }

    fn check_available(&self, sku: &Sku, wanted: i64) -> OrderResult<()> {
        let available = sku.available();
        if available < wanted {
            return Err(OrderError::InsufficientStock {
                sku_id: sku.sku_id.clone(),
                requested: wanted,
                available,
            });
        }
        Ok(())
    }
}
