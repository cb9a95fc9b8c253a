//! Address Repository

use super::RepoResult;
use shared::models::{Address, AddressCreate};
use sqlx::SqlitePool;

const ADDRESS_SELECT: &str = "SELECT public_id, user_id, recipient_name, phone, street, city, province, postal_code FROM address";

/// Ownership-checked resolution: the row must belong to the requesting user
pub async fn find_by_public_id(
    pool: &SqlitePool,
    public_id: &str,
    user_id: &str,
) -> RepoResult<Option<Address>> {
    let sql = format!("{} WHERE public_id = ? AND user_id = ?", ADDRESS_SELECT);
    let row = sqlx::query_as::<_, Address>(&sql)
        .bind(public_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> RepoResult<Vec<Address>> {
    let sql = format!("{} WHERE user_id = ?", ADDRESS_SELECT);
    let rows = sqlx::query_as::<_, Address>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn create(pool: &SqlitePool, data: AddressCreate) -> RepoResult<Address> {
    let public_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO address (public_id, user_id, recipient_name, phone, street, city, province, postal_code) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&public_id)
    .bind(&data.user_id)
    .bind(&data.recipient_name)
    .bind(&data.phone)
    .bind(&data.street)
    .bind(&data.city)
    .bind(&data.province)
    .bind(&data.postal_code)
    .execute(pool)
    .await?;

    Ok(Address {
        public_id,
        user_id: data.user_id,
        recipient_name: data.recipient_name,
        phone: data.phone,
        street: data.street,
        city: data.city,
        province: data.province,
        postal_code: data.postal_code,
    })
}
