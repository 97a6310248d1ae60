//! Webhook job processor.
//!
//! Consumes queued webhook payloads, runs each contained message through
//! the dialogue controller, and delivers the replies. One payload is one
//! job; a failing message or send never takes the worker down.

use crate::{
    chatbot::ChatbotService,
    models::webhook::WebhookPayload,
    services::whatsapp::MessagingApi,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Clone)]
pub struct WebhookProcessor {
    chatbot: ChatbotService,
    whatsapp: Arc<dyn MessagingApi>,
}

impl WebhookProcessor {
    pub fn new(chatbot: ChatbotService, whatsapp: Arc<dyn MessagingApi>) -> Self {
        Self { chatbot, whatsapp }
    }

    #[instrument(skip(self, payload))]
    pub async fn process(&self, payload: WebhookPayload) {
        let messages = payload.extract_messages();
        if messages.is_empty() {
            debug!("No messages in webhook payload");
            return;
        }

        for message in &messages {
            let sender_phone = message.from.clone();
            let replies = self.chatbot.process_message(message, &sender_phone).await;
            if replies.is_empty() {
                continue;
            }

            let count = replies.len();
            for reply in &replies {
                if let Err(e) = self.whatsapp.send_message(reply).await {
                    error!(to = %sender_phone, "Failed to send reply: {}", e);
                }
            }
            info!(to = %sender_phone, count, "Replies dispatched");
        }
    }
}
