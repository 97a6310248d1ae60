use crate::{
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item, Order, OrderItem,
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        total_amount: Decimal,
        delivery_address: &str,
        payment_link: Option<&str>,
    ) -> Result<order::Model, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError>;

    async fn list_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError>;

    async fn add_item(
        &self,
        order_id: Uuid,
        product_retailer_id: &str,
        product_name: &str,
        unit_price: Decimal,
        quantity: i32,
        subtotal: Decimal,
    ) -> Result<(), ServiceError>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), ServiceError>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), ServiceError>;

    async fn update_payment_link(&self, id: Uuid, link: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn require(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    #[instrument(skip(self))]
    async fn create(
        &self,
        user_id: Uuid,
        total_amount: Decimal,
        delivery_address: &str,
        payment_link: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_amount: Set(total_amount),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            delivery_address: Set(delivery_address.to_string()),
            payment_link: Set(payment_link.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find_by_id(id).one(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn add_item(
        &self,
        order_id: Uuid,
        product_retailer_id: &str,
        product_name: &str,
        unit_price: Decimal,
        quantity: i32,
        subtotal: Decimal,
    ) -> Result<(), ServiceError> {
        let line = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_retailer_id: Set(product_retailer_id.to_string()),
            product_name: Set(product_name.to_string()),
            unit_price: Set(unit_price),
            quantity: Set(quantity),
            subtotal: Set(subtotal),
            created_at: Set(Utc::now()),
        };
        line.insert(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), ServiceError> {
        let mut model: order::ActiveModel = self.require(id).await?.into();
        model.status = Set(status);
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), ServiceError> {
        let mut model: order::ActiveModel = self.require(id).await?.into();
        model.payment_status = Set(status);
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_payment_link(&self, id: Uuid, link: &str) -> Result<(), ServiceError> {
        let mut model: order::ActiveModel = self.require(id).await?.into();
        model.payment_link = Set(Some(link.to_string()));
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;
        Ok(())
    }
}
