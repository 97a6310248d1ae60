use crate::{
    chatbot::buttons::ButtonAction,
    flow::token,
    models::outbound::{OutboundMessage, ReplyButton},
    services::whatsapp::{FlowLaunchOptions, MessagingApi},
};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Welcome menu shown after onboarding and after a confirmed payment.
pub const WELCOME_MENU: &str = "Welcome to HappyWoman Commerce — the smart way to manage your supplies!\n\nWhat would you like to do today?\n\n*1.* Place your orders quickly\n*2.* Track your business expenses\n*3.* Earn rewards for every transaction!\n\nPlease reply with the number (1, 2, or 3).";

/// Onboarding flow: launches the native WhatsApp Flow form for unknown
/// numbers and owns the main menu message.
#[derive(Clone)]
pub struct OnboardingFlow {
    whatsapp: Arc<dyn MessagingApi>,
    flow_id: String,
}

impl OnboardingFlow {
    pub fn new(whatsapp: Arc<dyn MessagingApi>, flow_id: String) -> Self {
        Self { whatsapp, flow_id }
    }

    /// Sends the onboarding Flow. Failures are logged, not propagated: an
    /// unknown user who cannot receive the form gets another chance on
    /// their next message.
    #[instrument(skip(self))]
    pub async fn send_onboarding_flow(&self, phone_number: &str) {
        let flow_token = token::encode_phone_number(phone_number);

        let options = FlowLaunchOptions {
            header_text: Some("Welcome to HappyWoman Commerce! 👋".to_string()),
            body_text: "Welcome! We're excited to have you join our platform. To get started \
                        and access all our features, please complete your onboarding by filling \
                        out a few quick questions. This will only take a minute!"
                .to_string(),
            footer_text: Some("HappyWoman Commerce".to_string()),
            flow_cta: "Complete Onboarding".to_string(),
            flow_token,
            screen: "BASIC_INFO".to_string(),
        };

        if let Err(e) = self
            .whatsapp
            .send_flow(phone_number, &self.flow_id, options)
            .await
        {
            warn!(%phone_number, "Failed to send onboarding flow: {}", e);
        }
    }

    pub fn main_menu(&self, phone_number: &str) -> OutboundMessage {
        OutboundMessage::buttons(
            phone_number,
            "What would you like to do next?",
            vec![ReplyButton::new(
                ButtonAction::PlaceOrderMain.encode(),
                "Place an order",
            )],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        flows: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl MessagingApi for RecordingMessenger {
        async fn send_message(&self, _: &OutboundMessage) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn send_flow(
            &self,
            to: &str,
            flow_id: &str,
            options: FlowLaunchOptions,
        ) -> Result<(), ServiceError> {
            self.flows.lock().unwrap().push((
                to.to_string(),
                flow_id.to_string(),
                options.flow_token,
            ));
            Ok(())
        }

        async fn send_document(
            &self,
            _: &str,
            _: &str,
            _: Vec<u8>,
            _: &str,
            _: Option<&str>,
        ) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn upload_media(
            &self,
            _: Vec<u8>,
            _: &str,
            _: &str,
        ) -> Result<String, ServiceError> {
            Ok("media-1".into())
        }

        async fn send_typing(&self, _: &str, _: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        fn verify_webhook(&self, _: &str, _: &str, _: &str) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn onboarding_flow_carries_phone_bound_token() {
        let messenger = Arc::new(RecordingMessenger::default());
        let flow = OnboardingFlow::new(messenger.clone(), "2264166450676386".into());

        flow.send_onboarding_flow("2348012345678").await;

        let sent = messenger.flows.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, flow_id, flow_token) = &sent[0];
        assert_eq!(to, "2348012345678");
        assert_eq!(flow_id, "2264166450676386");
        assert_eq!(
            token::extract_phone_number(Some(flow_token)).as_deref(),
            Some("2348012345678")
        );
    }

    #[test]
    fn main_menu_offers_order_entry() {
        let messenger = Arc::new(RecordingMessenger::default());
        let flow = OnboardingFlow::new(messenger, "flow".into());

        match flow.main_menu("234") {
            OutboundMessage::Interactive { to, interactive } => {
                assert_eq!(to, "234");
                match interactive {
                    crate::models::outbound::Interactive::Buttons { buttons, .. } => {
                        assert_eq!(buttons.len(), 1);
                        assert_eq!(buttons[0].id, "place_order_main");
                    }
                    _ => panic!("expected buttons"),
                }
            }
            _ => panic!("expected interactive message"),
        }
    }
}
