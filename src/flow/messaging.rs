//! Post-onboarding notifications.
//!
//! After a successful onboarding write, the user gets a welcome message and
//! the main menu over regular WhatsApp messaging. These sends run detached
//! from the Flow HTTP response; failures are logged, never surfaced, since
//! the user record already exists.

use crate::{
    chatbot::buttons::ButtonAction,
    models::outbound::{OutboundMessage, ReplyButton},
    services::whatsapp::MessagingApi,
};
use std::sync::Arc;
use tracing::{error, instrument};

#[derive(Clone)]
pub struct FlowMessaging {
    whatsapp: Arc<dyn MessagingApi>,
}

impl FlowMessaging {
    pub fn new(whatsapp: Arc<dyn MessagingApi>) -> Self {
        Self { whatsapp }
    }

    #[instrument(skip(self))]
    pub async fn send_onboarding_success_messages(&self, phone_number: &str) {
        let welcome = OutboundMessage::text(
            phone_number,
            "🎉 Your business has been successfully onboarded! Welcome to HappyWoman Commerce.",
        );
        let menu = OutboundMessage::buttons(
            phone_number,
            "What would you like to do next?",
            vec![ReplyButton::new(
                ButtonAction::PlaceOrderMain.encode(),
                "Place an order",
            )],
        );

        for message in [welcome, menu] {
            if let Err(e) = self.whatsapp.send_message(&message).await {
                error!(%phone_number, "Failed to send onboarding success message: {}", e);
            }
        }
    }
}
