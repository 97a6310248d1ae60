use crate::{
    entities::{cart_item, CartItem},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<cart_item::Model>, ServiceError>;

    /// Adds `quantity` units, merging into an existing line for the same
    /// product if present.
    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError>;

    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError>;

    async fn remove_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
    ) -> Result<(), ServiceError>;

    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SeaOrmCartStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCartStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_line(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductRetailerId.eq(product_retailer_id))
            .one(&*self.db)
            .await?)
    }
}

#[async_trait]
impl CartStore for SeaOrmCartStore {
    #[instrument(skip(self))]
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        match self.find_line(user_id, product_retailer_id).await? {
            Some(existing) => {
                let merged = existing.quantity.saturating_add(quantity);
                let mut line: cart_item::ActiveModel = existing.into();
                line.quantity = Set(merged);
                line.updated_at = Set(Utc::now());
                line.update(&*self.db).await?;
            }
            None => {
                let now = Utc::now();
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_retailer_id: Set(product_retailer_id.to_string()),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&*self.db).await?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return self.remove_item(user_id, product_retailer_id).await;
        }

        let existing = self
            .find_line(user_id, product_retailer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Cart item {} not found for user {}",
                    product_retailer_id, user_id
                ))
            })?;

        let mut line: cart_item::ActiveModel = existing.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        line.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_item(
        &self,
        user_id: Uuid,
        product_retailer_id: &str,
    ) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductRetailerId.eq(product_retailer_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
