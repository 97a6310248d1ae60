use crate::{
    chatbot::{buttons::ButtonAction, flows::onboarding::WELCOME_MENU},
    errors::ServiceError,
    models::outbound::{Interactive, OutboundMessage, ReplyButton},
    services::{
        documents::{CustomerDetails, DocumentService},
        orders::{OrderService, OrderWithItems},
        payments::{PaymentGateway, PaymentMetadata},
        users::UserService,
        whatsapp::MessagingApi,
    },
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Order flow: address negotiation, order placement with payment link, and
/// post-payment confirmation.
#[derive(Clone)]
pub struct OrderFlow {
    order_service: OrderService,
    user_service: UserService,
    payments: Arc<dyn PaymentGateway>,
    whatsapp: Arc<dyn MessagingApi>,
    documents: DocumentService,
}

impl OrderFlow {
    pub fn new(
        order_service: OrderService,
        user_service: UserService,
        payments: Arc<dyn PaymentGateway>,
        whatsapp: Arc<dyn MessagingApi>,
        documents: DocumentService,
    ) -> Self {
        Self {
            order_service,
            user_service,
            payments,
            whatsapp,
            documents,
        }
    }

    /// Asks the user to confirm their saved address or provide a new one.
    pub fn confirm_address_message(&self, phone_number: &str, address: &str) -> OutboundMessage {
        OutboundMessage::buttons(
            phone_number,
            format!(
                "Your saved address is:\n{}\n\nWould you like to use this address?",
                address
            ),
            vec![
                ReplyButton::new(ButtonAction::UseExistingAddress.encode(), "Use This Address"),
                ReplyButton::new(
                    ButtonAction::ProvideNewAddress.encode(),
                    "Provide New Address",
                ),
            ],
        )
    }

    pub fn request_delivery_address(&self, phone_number: &str) -> OutboundMessage {
        OutboundMessage::text(phone_number, "Please provide your delivery address:")
    }

    /// Snapshots the cart into an order, attaches a payment link, sends a
    /// best-effort PDF invoice, and returns the pay-now message.
    #[instrument(skip(self))]
    pub async fn handle_place_order(
        &self,
        phone_number: &str,
        user_id: Uuid,
        delivery_address: &str,
    ) -> Vec<OutboundMessage> {
        match self
            .place_order(phone_number, user_id, delivery_address)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to place order: {}", e);
                let body = match e {
                    ServiceError::EmptyCart => "Your cart is empty or contains products that \
                        are no longer available. Please browse the catalog and add items to \
                        your cart again."
                        .to_string(),
                    ServiceError::InvalidCartTotal => "Your cart contains invalid items. \
                        Please browse the catalog and add items to your cart again."
                        .to_string(),
                    other => format!("Sorry, we couldn't process your order. {}", other),
                };
                vec![OutboundMessage::text(phone_number, body)]
            }
        }
    }

    async fn place_order(
        &self,
        phone_number: &str,
        user_id: Uuid,
        delivery_address: &str,
    ) -> Result<Vec<OutboundMessage>, ServiceError> {
        let order = self
            .order_service
            .create_order_from_cart(user_id, delivery_address)
            .await?;
        info!(order_id = %order.order.id, total = %order.order.total_amount, "Order placed");

        let user = self.user_service.find_by_phone(phone_number).await?;
        let email = user
            .as_ref()
            .map(|u| u.email.clone())
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| format!("{}@whatsapp.local", phone_number));

        let payment_link = self
            .payments
            .generate_payment_link(
                order.order.id,
                order.order.total_amount,
                &email,
                PaymentMetadata {
                    order_id: order.order.id,
                    user_id,
                    phone_number: phone_number.to_string(),
                },
            )
            .await?;
        self.order_service
            .update_payment_link(order.order.id, &payment_link)
            .await?;

        // Best-effort invoice; the order and payment link already exist.
        let customer = CustomerDetails {
            name: user
                .as_ref()
                .map(|u| u.business_name.clone())
                .unwrap_or_else(|| phone_number.to_string()),
            phone_number: phone_number.to_string(),
            address: delivery_address.to_string(),
        };
        self.send_pdf(&order, &customer, phone_number, false).await;

        Ok(vec![OutboundMessage::Interactive {
            to: phone_number.to_string(),
            interactive: Interactive::CtaUrl {
                header: Some("Payment".to_string()),
                body: format!(
                    "Your order has been created!\n\nOrder ID: {}\nTotal: ₦{:.2}\n\nTap the \
                     button below to complete your payment.",
                    order.order.id, order.order.total_amount
                ),
                footer: Some("Thank you for your purchase".to_string()),
                display_text: "Pay Now".to_string(),
                url: payment_link,
            },
        }])
    }

    /// Invoked from the payment verification callback, not the chat:
    /// marks the order paid, sends the receipt, re-presents the menu.
    #[instrument(skip(self))]
    pub async fn handle_payment_confirmation(
        &self,
        phone_number: &str,
        order_id: Uuid,
    ) -> Vec<OutboundMessage> {
        match self.confirm_payment(phone_number, order_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to confirm payment: {}", e);
                vec![OutboundMessage::text(
                    phone_number,
                    "Sorry, we couldn't confirm your payment. Please contact support.",
                )]
            }
        }
    }

    async fn confirm_payment(
        &self,
        phone_number: &str,
        order_id: Uuid,
    ) -> Result<Vec<OutboundMessage>, ServiceError> {
        self.order_service.mark_paid(order_id).await?;

        let order = self
            .order_service
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let user = self.user_service.find_by_phone(phone_number).await?;
        let customer = CustomerDetails {
            name: user
                .map(|u| u.business_name)
                .unwrap_or_else(|| phone_number.to_string()),
            phone_number: phone_number.to_string(),
            address: order.order.delivery_address.clone(),
        };
        self.send_pdf(&order, &customer, phone_number, true).await;

        Ok(vec![OutboundMessage::text(phone_number, WELCOME_MENU)])
    }

    /// Renders and sends the invoice/receipt document. Logged-only on
    /// failure: the primary transaction has already succeeded.
    async fn send_pdf(
        &self,
        order: &OrderWithItems,
        customer: &CustomerDetails,
        phone_number: &str,
        receipt: bool,
    ) {
        let (rendered, prefix, caption) = if receipt {
            (
                self.documents.render_receipt(order, customer),
                "receipt",
                Some(
                    "🎉 Payment confirmed! Your receipt is attached and your order is being \
                     processed.",
                ),
            )
        } else {
            (self.documents.render_invoice(order, customer), "invoice", None)
        };

        let bytes = match rendered {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(order_id = %order.order.id, "Failed to render {}: {}", prefix, e);
                return;
            }
        };

        let filename = format!("{}-{}.pdf", prefix, order.order.id);
        if let Err(e) = self
            .whatsapp
            .send_document(phone_number, &filename, bytes, "application/pdf", caption)
            .await
        {
            warn!(order_id = %order.order.id, "Failed to send {}: {}", prefix, e);
        }
    }
}
