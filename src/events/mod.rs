use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published by the services. Processing is fire-and-forget;
/// a lost event must never fail the operation that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Onboarding events
    UserOnboarded {
        phone_number: String,
    },

    // Cart events
    CartItemAdded {
        user_id: Uuid,
        product_retailer_id: String,
        quantity: i32,
    },
    CartItemPruned {
        user_id: Uuid,
        product_retailer_id: String,
    },
    CartCleared(Uuid),

    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        new_status: String,
    },

    // Payment events
    PaymentLinkGenerated(Uuid),
    PaymentConfirmed(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of propagating delivery failures.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event delivery failed: {}", e);
        }
    }
}

/// Processes incoming events. Currently log-only; downstream consumers
/// (analytics, notifications) attach here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "Order created");
            }
            Event::PaymentConfirmed(order_id) => {
                info!(%order_id, "Payment confirmed");
            }
            Event::UserOnboarded { phone_number } => {
                info!(%phone_number, "User onboarded");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::OrderCreated(Uuid::new_v4()))
            .await
            .expect("send should succeed");

        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic even though the receiver is gone
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }
}
