//! Address service
//!
//! Ownership-checked address resolution for delivery orders. The address
//! book itself belongs to the excluded profile service; this is the read
//! surface the engine needs plus a create used for seeding.

use sqlx::SqlitePool;

use crate::db::repository::address;
use crate::orders::traits::{OrderError, OrderResult};
use shared::models::{Address, AddressCreate};

#[derive(Clone)]
pub struct AddressService {
    pool: SqlitePool,
}

impl AddressService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve an address by public id, verifying it belongs to the user
    pub async fn resolve(&self, public_id: &str, user_id: &str) -> OrderResult<Address> {
        address::find_by_public_id(&self.pool, public_id, user_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?
            .ok_or_else(|| OrderError::AddressNotFound(public_id.to_string()))
    }

    pub async fn list(&self, user_id: &str) -> OrderResult<Vec<Address>> {
        address::find_by_user(&self.pool, user_id)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }

    pub async fn create(&self, data: AddressCreate) -> OrderResult<Address> {
        address::create(&self.pool, data)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    fn sample_create(user_id: &str) -> AddressCreate {
        AddressCreate {
            user_id: user_id.to_string(),
            recipient_name: "T. Mokoena".to_string(),
            phone: "+27110000000".to_string(),
            street: "1 Long Street".to_string(),
            city: "Johannesburg".to_string(),
            province: "GAUTENG".to_string(),
            postal_code: "2000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_is_ownership_checked() {
        let db = DbService::new_in_memory().await.unwrap();
        let service = AddressService::new(db.pool);

        let created = service.create(sample_create("user-1")).await.unwrap();

        let resolved = service.resolve(&created.public_id, "user-1").await.unwrap();
        assert_eq!(resolved.province, "GAUTENG");

        // Another user cannot resolve it
        assert!(matches!(
            service.resolve(&created.public_id, "user-2").await,
            Err(OrderError::AddressNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let db = DbService::new_in_memory().await.unwrap();
        let service = AddressService::new(db.pool);

        service.create(sample_create("user-1")).await.unwrap();
        service.create(sample_create("user-1")).await.unwrap();
        service.create(sample_create("user-2")).await.unwrap();

        assert_eq!(service.list("user-1").await.unwrap().len(), 2);
        assert_eq!(service.list("user-2").await.unwrap().len(), 1);
    }
}
