//! Per-phone conversation sessions.
//!
//! Checkout needs to remember, between webhook deliveries, that a user was
//! asked for a delivery address. That state is transient by design: it
//! lives in process memory, keyed by phone number, and is dropped on any
//! terminal transition. Entries expire after a TTL so an abandoned checkout
//! cannot silently reactivate days later.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Where an in-flight order placement currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// User has a saved address and was asked to confirm or replace it
    AwaitingAddressConfirmation,
    /// User was asked to type a delivery address
    AwaitingAddressInput,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub user_id: Uuid,
    pub state: SessionState,
    started_at: Instant,
}

/// At most one session per phone number; setting a new state overwrites any
/// prior session for that number.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, ConversationSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Returns the live session for this phone, lazily evicting expired
    /// entries so they behave as absent.
    pub fn get(&self, phone: &str) -> Option<ConversationSession> {
        let expired = match self.sessions.get(phone) {
            Some(entry) => entry.started_at.elapsed() >= self.ttl,
            None => return None,
        };

        if expired {
            self.sessions.remove(phone);
            return None;
        }
        self.sessions.get(phone).map(|entry| entry.value().clone())
    }

    pub fn set(&self, phone: &str, user_id: Uuid, state: SessionState) {
        self.sessions.insert(
            phone.to_string(),
            ConversationSession {
                user_id,
                state,
                started_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self, phone: &str) {
        self.sessions.remove(phone);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
