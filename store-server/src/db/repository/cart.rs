//! Cart Repository

use super::RepoResult;
use shared::models::CartItem;
use shared::util::now_millis;
use sqlx::SqlitePool;

pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> RepoResult<Vec<CartItem>> {
    let rows = sqlx::query_as::<_, CartItem>(
        "SELECT user_id, sku_id, quantity, created_at, updated_at FROM cart_item WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_item(
    pool: &SqlitePool,
    user_id: &str,
    sku_id: &str,
) -> RepoResult<Option<CartItem>> {
    let row = sqlx::query_as::<_, CartItem>(
        "SELECT user_id, sku_id, quantity, created_at, updated_at FROM cart_item WHERE user_id = ? AND sku_id = ?",
    )
    .bind(user_id)
    .bind(sku_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert a row or add to the existing quantity
pub async fn upsert_item(
    pool: &SqlitePool,
    user_id: &str,
    sku_id: &str,
    quantity: i32,
) -> RepoResult<CartItem> {
    let now = now_millis();
    sqlx::query(
        "INSERT INTO cart_item (user_id, sku_id, quantity, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT (user_id, sku_id) DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(sku_id)
    .bind(quantity)
    .bind(now)
    .execute(pool)
    .await?;

    find_item(pool, user_id, sku_id)
        .await?
        .ok_or_else(|| super::RepoError::Database("cart row missing after upsert".to_string()))
}

/// Replace the quantity of an existing row. Returns false if no row exists.
pub async fn set_quantity(
    pool: &SqlitePool,
    user_id: &str,
    sku_id: &str,
    quantity: i32,
) -> RepoResult<bool> {
    let now = now_millis();
    let result = sqlx::query(
        "UPDATE cart_item SET quantity = ?1, updated_at = ?2 WHERE user_id = ?3 AND sku_id = ?4",
    )
    .bind(quantity)
    .bind(now)
    .bind(user_id)
    .bind(sku_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_item(pool: &SqlitePool, user_id: &str, sku_id: &str) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM cart_item WHERE user_id = ? AND sku_id = ?")
        .bind(user_id)
        .bind(sku_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear(pool: &SqlitePool, user_id: &str) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM cart_item WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
