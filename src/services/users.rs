use crate::{
    entities::user,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{NewUser, UserStore},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};
use uuid::Uuid;

/// User service with an in-memory TTL cache in front of the existence
/// check, which runs on every inbound message from an unknown number.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    event_sender: Arc<EventSender>,
    existence_cache: Arc<DashMap<String, CachedExistence>>,
    cache_ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
struct CachedExistence {
    exists: bool,
    cached_at: Instant,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        event_sender: Arc<EventSender>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            event_sender,
            existence_cache: Arc::new(DashMap::new()),
            cache_ttl,
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<user::Model>, ServiceError> {
        self.store.find_by_phone(phone).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        self.store.find_by_email(email).await
    }

    /// Cached existence check. A store failure is treated as "not existing"
    /// so a flaky database degrades to re-onboarding prompts instead of
    /// dropped conversations.
    #[instrument(skip(self))]
    pub async fn check_user_exists(&self, phone: &str) -> bool {
        if let Some(entry) = self.existence_cache.get(phone) {
            if entry.cached_at.elapsed() < self.cache_ttl {
                return entry.exists;
            }
        }

        match self.store.exists_by_phone(phone).await {
            Ok(exists) => {
                self.existence_cache.insert(
                    phone.to_string(),
                    CachedExistence {
                        exists,
                        cached_at: Instant::now(),
                    },
                );
                exists
            }
            Err(e) => {
                warn!("User store unavailable, treating user as new: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self, input), fields(phone = %input.phone_number))]
    pub async fn create_user(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        let phone = input.phone_number.clone();
        let created = self.store.create(input).await?;

        self.existence_cache.insert(
            phone.clone(),
            CachedExistence {
                exists: true,
                cached_at: Instant::now(),
            },
        );
        self.event_sender
            .send_or_log(Event::UserOnboarded {
                phone_number: phone,
            })
            .await;

        Ok(created)
    }
}
