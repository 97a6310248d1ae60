use crate::{
    entities::{user, User},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Fields required to register a business user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: String,
    pub business_name: String,
    pub contact_person: String,
    pub email: String,
    pub address: Option<String>,
    pub nature_of_business: String,
    pub registration_number: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<user::Model>, ServiceError>;

    /// Id-only lookup used by the duplicate-email check
    async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError>;

    async fn create(&self, input: NewUser) -> Result<user::Model, ServiceError>;

    async fn exists_by_phone(&self, phone: &str) -> Result<bool, ServiceError>;
}

#[derive(Clone)]
pub struct SeaOrmUserStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmUserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SeaOrmUserStore {
    #[instrument(skip(self))]
    async fn find_by_phone(&self, phone: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(User::find()
            .filter(user::Column::PhoneNumber.eq(phone))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        #[derive(sea_orm::FromQueryResult)]
        struct IdOnly {
            id: Uuid,
        }

        let found = User::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Email.eq(email))
            .into_model::<IdOnly>()
            .one(&*self.db)
            .await?;
        Ok(found.map(|row| row.id))
    }

    #[instrument(skip(self, input), fields(phone = %input.phone_number))]
    async fn create(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone_number: Set(input.phone_number),
            business_name: Set(input.business_name),
            contact_person: Set(input.contact_person),
            email: Set(input.email),
            address: Set(input.address),
            nature_of_business: Set(input.nature_of_business),
            registration_number: Set(input.registration_number),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn exists_by_phone(&self, phone: &str) -> Result<bool, ServiceError> {
        let found = User::find()
            .filter(user::Column::PhoneNumber.eq(phone))
            .one(&*self.db)
            .await?;
        Ok(found.is_some())
    }
}
