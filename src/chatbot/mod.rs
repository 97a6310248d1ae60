//! The dialogue controller.
//!
//! Interprets each inbound message against the per-phone conversation
//! session and produces zero or more outbound messages. One inbound message
//! is processed to completion (including all awaited sub-calls) before the
//! next for the same worker; sessions for different phone numbers are
//! independent.

pub mod buttons;
pub mod flows;
pub mod processor;
pub mod session;

use crate::{
    chatbot::{
        buttons::ButtonAction,
        flows::{CartFlow, OnboardingFlow, OrderFlow},
        session::{SessionState, SessionStore},
    },
    entities::user,
    models::{
        outbound::OutboundMessage,
        webhook::{InboundMessage, InteractiveKind, MessageKind},
    },
    services::{
        cart::CartService,
        orders::OrderService,
        payments::{PaymentGateway, PaymentMetadata},
        users::UserService,
    },
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Addresses shorter than this are asked for again.
const MIN_ADDRESS_LEN: usize = 10;
/// Escape keyword that abandons an in-flight checkout.
const CANCEL_KEYWORD: &str = "cancel";

#[derive(Clone)]
pub struct ChatbotService {
    user_service: UserService,
    cart_service: CartService,
    order_service: OrderService,
    payments: Arc<dyn PaymentGateway>,
    onboarding_flow: OnboardingFlow,
    cart_flow: CartFlow,
    order_flow: OrderFlow,
    sessions: SessionStore,
}

impl ChatbotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_service: UserService,
        cart_service: CartService,
        order_service: OrderService,
        payments: Arc<dyn PaymentGateway>,
        onboarding_flow: OnboardingFlow,
        cart_flow: CartFlow,
        order_flow: OrderFlow,
        sessions: SessionStore,
    ) -> Self {
        Self {
            user_service,
            cart_service,
            order_service,
            payments,
            onboarding_flow,
            cart_flow,
            order_flow,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Top-level dispatch. An empty vec means no reply.
    #[instrument(skip(self, message), fields(kind = ?message.kind))]
    pub async fn process_message(
        &self,
        message: &InboundMessage,
        sender_phone: &str,
    ) -> Vec<OutboundMessage> {
        info!(%sender_phone, "Processing message");

        match message.kind {
            MessageKind::Text => self.handle_text_message(message, sender_phone).await,
            MessageKind::Interactive => {
                self.handle_interactive_message(message, sender_phone).await
            }
            MessageKind::Order => self.handle_order_message(message, sender_phone).await,
            MessageKind::Unsupported => {
                debug!("Unhandled message type, ignoring");
                Vec::new()
            }
        }
    }

    async fn handle_text_message(
        &self,
        message: &InboundMessage,
        sender_phone: &str,
    ) -> Vec<OutboundMessage> {
        let Some(text) = message.text.as_ref().map(|t| t.body.trim()) else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        if let Some(session) = self.sessions.get(sender_phone) {
            if text.eq_ignore_ascii_case(CANCEL_KEYWORD) {
                self.sessions.clear(sender_phone);
                return vec![
                    OutboundMessage::text(sender_phone, "Your order has been cancelled."),
                    self.onboarding_flow.main_menu(sender_phone),
                ];
            }

            match session.state {
                SessionState::AwaitingAddressConfirmation => {
                    // Free text cannot answer a button prompt
                    return vec![OutboundMessage::text(
                        sender_phone,
                        "Please use the buttons above to confirm your delivery address, or \
                         reply \"cancel\" to start over.",
                    )];
                }
                SessionState::AwaitingAddressInput => {
                    if text.chars().count() < MIN_ADDRESS_LEN {
                        return vec![OutboundMessage::text(
                            sender_phone,
                            "That address looks too short. Please send your full delivery \
                             address, or reply \"cancel\" to start over.",
                        )];
                    }

                    info!("Address received, proceeding with order placement");
                    self.sessions.clear(sender_phone);
                    return self
                        .order_flow
                        .handle_place_order(sender_phone, session.user_id, text)
                        .await;
                }
            }
        }

        let user = match self.resolve_user(sender_phone).await {
            Ok(Some(user)) => user,
            Ok(None) => return Vec::new(),
            Err(reply) => return reply,
        };
        debug!(user_id = %user.id, "Known user, interpreting as menu selection");

        match text {
            "1" => vec![self.cart_flow.show_product_catalog(sender_phone).await],
            "2" => vec![
                OutboundMessage::text(
                    sender_phone,
                    "Track your business expenses feature is coming soon! Stay tuned for \
                     updates.",
                ),
                self.onboarding_flow.main_menu(sender_phone),
            ],
            "3" => vec![
                OutboundMessage::text(
                    sender_phone,
                    "Earn rewards for every transaction feature is coming soon! Stay tuned \
                     for updates.",
                ),
                self.onboarding_flow.main_menu(sender_phone),
            ],
            _ => vec![self.onboarding_flow.main_menu(sender_phone)],
        }
    }

    async fn handle_interactive_message(
        &self,
        message: &InboundMessage,
        sender_phone: &str,
    ) -> Vec<OutboundMessage> {
        let Some(interactive) = &message.interactive else {
            return Vec::new();
        };

        let reply_id = match interactive.kind {
            InteractiveKind::ButtonReply => {
                interactive.button_reply.as_ref().map(|r| r.id.clone())
            }
            InteractiveKind::ListReply => interactive.list_reply.as_ref().map(|r| r.id.clone()),
            _ => None,
        };
        let Some(reply_id) = reply_id else {
            return Vec::new();
        };

        let user = match self.resolve_user(sender_phone).await {
            Ok(Some(user)) => user,
            Ok(None) => return Vec::new(),
            Err(reply) => return reply,
        };

        // A tap on a catalog product ad carries the product in the context
        if let Some(retailer_id) = message
            .context
            .as_ref()
            .and_then(|ctx| ctx.referred_product.as_ref())
            .and_then(|product| product.product_retailer_id.as_deref())
        {
            return vec![
                self.cart_flow
                    .handle_add_to_cart(sender_phone, user.id, retailer_id, 1)
                    .await,
            ];
        }

        let action = ButtonAction::decode(&reply_id);
        info!(?action, "Button tapped");

        match action {
            ButtonAction::ViewCart | ButtonAction::EditCart => {
                vec![self.cart_flow.show_cart(sender_phone, user.id).await]
            }
            ButtonAction::BrowseProducts
            | ButtonAction::ViewAllProducts
            | ButtonAction::PlaceOrderMain => {
                vec![self.cart_flow.show_product_catalog(sender_phone).await]
            }
            ButtonAction::AddProduct(retailer_id) => {
                vec![
                    self.cart_flow
                        .handle_add_to_cart(sender_phone, user.id, &retailer_id, 1)
                        .await,
                ]
            }
            ButtonAction::PlaceOrder => self.start_address_negotiation(sender_phone, &user),
            ButtonAction::UseExistingAddress => {
                self.use_existing_address(sender_phone, &user).await
            }
            ButtonAction::ProvideNewAddress => {
                let Some(session) = self.sessions.get(sender_phone) else {
                    warn!("provide_new_address tapped without a pending order");
                    return Vec::new();
                };
                self.sessions.set(
                    sender_phone,
                    session.user_id,
                    SessionState::AwaitingAddressInput,
                );
                vec![self.order_flow.request_delivery_address(sender_phone)]
            }
            ButtonAction::PayOrder(order_id) => {
                self.resend_payment_link(sender_phone, &user, order_id).await
            }
            ButtonAction::RetryOnboarding => {
                self.onboarding_flow.send_onboarding_flow(sender_phone).await;
                Vec::new()
            }
            ButtonAction::BackToMenu => vec![self.onboarding_flow.main_menu(sender_phone)],
            ButtonAction::Unknown(id) => {
                warn!(%id, "Unrecognized button id, ignoring");
                Vec::new()
            }
        }
    }

    /// Native WhatsApp order submission: revalidate every submitted line
    /// through the regular add-to-cart path, then branch into the same
    /// address negotiation as the place-order button.
    async fn handle_order_message(
        &self,
        message: &InboundMessage,
        sender_phone: &str,
    ) -> Vec<OutboundMessage> {
        let user = match self.resolve_user(sender_phone).await {
            Ok(Some(user)) => user,
            Ok(None) => return Vec::new(),
            Err(reply) => return reply,
        };

        let items = message
            .order
            .as_ref()
            .map(|order| order.product_items.as_slice())
            .unwrap_or_default();
        if items.is_empty() {
            warn!("Order message without product items");
            return vec![OutboundMessage::text(
                sender_phone,
                "Sorry, we couldn't process your order. No items found.",
            )];
        }
        info!(count = items.len(), "Processing native order submission");

        if let Err(e) = self.cart_service.clear_cart(user.id).await {
            warn!("Failed to clear cart before order import: {}", e);
            return vec![OutboundMessage::text(
                sender_phone,
                format!("Sorry, we couldn't process your order. {}", e),
            )];
        }

        for item in items {
            let quantity = item.quantity_or_default();
            // Per-item validation failures only drop that line; the rest
            // of the submission continues into checkout.
            if let Err(e) = self
                .cart_service
                .add_item(user.id, &item.product_retailer_id, quantity)
                .await
            {
                warn!(
                    retailer_id = %item.product_retailer_id,
                    "Skipping submitted item: {}", e
                );
            }
        }

        self.start_address_negotiation(sender_phone, &user)
    }

    /// Branch on saved address: confirmation when one exists, free-text
    /// input otherwise. Either way a session is opened.
    fn start_address_negotiation(
        &self,
        sender_phone: &str,
        user: &user::Model,
    ) -> Vec<OutboundMessage> {
        match user.address.as_deref().filter(|a| !a.is_empty()) {
            Some(address) => {
                info!("User has a saved address, requesting confirmation");
                self.sessions.set(
                    sender_phone,
                    user.id,
                    SessionState::AwaitingAddressConfirmation,
                );
                vec![self.order_flow.confirm_address_message(sender_phone, address)]
            }
            None => {
                info!("No saved address, requesting input");
                self.sessions
                    .set(sender_phone, user.id, SessionState::AwaitingAddressInput);
                vec![self.order_flow.request_delivery_address(sender_phone)]
            }
        }
    }

    async fn use_existing_address(
        &self,
        sender_phone: &str,
        user: &user::Model,
    ) -> Vec<OutboundMessage> {
        let Some(session) = self.sessions.get(sender_phone) else {
            warn!("use_existing_address tapped without a pending order");
            return Vec::new();
        };
        if session.state != SessionState::AwaitingAddressConfirmation {
            warn!(state = ?session.state, "use_existing_address tapped in wrong state");
            return Vec::new();
        }

        let Some(address) = user.address.clone().filter(|a| !a.is_empty()) else {
            warn!("Saved address disappeared between confirmation and placement");
            self.sessions.clear(sender_phone);
            return vec![self.order_flow.request_delivery_address(sender_phone)];
        };

        self.sessions.clear(sender_phone);
        self.order_flow
            .handle_place_order(sender_phone, session.user_id, &address)
            .await
    }

    /// Pay-now taps reuse the stored payment link or mint a fresh one.
    async fn resend_payment_link(
        &self,
        sender_phone: &str,
        user: &user::Model,
        order_id: uuid::Uuid,
    ) -> Vec<OutboundMessage> {
        let order = match self.order_service.find_by_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(%order_id, "Pay-now tapped for unknown order");
                return vec![OutboundMessage::text(
                    sender_phone,
                    "Sorry, we couldn't find your order. Please try again or contact support.",
                )];
            }
            Err(e) => {
                warn!(%order_id, "Order lookup failed: {}", e);
                return vec![OutboundMessage::text(
                    sender_phone,
                    "Sorry, we couldn't find your order. Please try again or contact support.",
                )];
            }
        };

        let payment_link = match order.order.payment_link.clone() {
            Some(link) => link,
            None => {
                let email = if user.email.is_empty() {
                    format!("{}@whatsapp.local", sender_phone)
                } else {
                    user.email.clone()
                };
                info!(%order_id, "Generating new payment link");

                match self
                    .payments
                    .generate_payment_link(
                        order.order.id,
                        order.order.total_amount,
                        &email,
                        PaymentMetadata {
                            order_id: order.order.id,
                            user_id: user.id,
                            phone_number: sender_phone.to_string(),
                        },
                    )
                    .await
                {
                    Ok(link) => {
                        if let Err(e) = self
                            .order_service
                            .update_payment_link(order.order.id, &link)
                            .await
                        {
                            warn!("Failed to persist payment link: {}", e);
                        }
                        link
                    }
                    Err(e) => {
                        warn!("Failed to generate payment link: {}", e);
                        return vec![OutboundMessage::text(
                            sender_phone,
                            "Sorry, we couldn't prepare your payment link. Please try again \
                             later.",
                        )];
                    }
                }
            }
        };

        vec![OutboundMessage::text_with_preview(
            sender_phone,
            format!(
                "Please complete your payment using this secure link:\n{}\n\nAfter payment, \
                 you will receive your receipt here on WhatsApp.",
                payment_link
            ),
        )]
    }

    /// Resolves the sender. Unknown numbers get the onboarding Flow
    /// (`Ok(None)`); a store failure yields the apology reply to send.
    async fn resolve_user(
        &self,
        sender_phone: &str,
    ) -> Result<Option<user::Model>, Vec<OutboundMessage>> {
        match self.user_service.find_by_phone(sender_phone).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => {
                info!("Unknown number, sending onboarding flow");
                self.onboarding_flow.send_onboarding_flow(sender_phone).await;
                Ok(None)
            }
            Err(e) => {
                warn!("User lookup failed: {}", e);
                Err(vec![OutboundMessage::text(
                    sender_phone,
                    "Sorry, something went wrong on our side. Please try again in a moment.",
                )])
            }
        }
    }
}
