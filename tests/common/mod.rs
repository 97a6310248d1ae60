//! In-memory fakes for the §6 collaborator contracts, plus a harness that
//! wires a full dialogue controller on top of them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;
use whatsapp_commerce_api::{
    chatbot::{
        flows::{CartFlow, OnboardingFlow, OrderFlow},
        session::SessionStore,
        ChatbotService,
    },
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item, user,
    },
    errors::ServiceError,
    events::EventSender,
    models::outbound::OutboundMessage,
    models::webhook::{InboundMessage, WebhookPayload},
    repositories::{CartStore, NewUser, OrderStore, UserStore},
    services::{
        cart::CartService,
        catalog::{Availability, CatalogApi, Product},
        documents::DocumentService,
        orders::OrderService,
        payments::{PaymentGateway, PaymentMetadata, PaymentVerification},
        users::UserService,
        whatsapp::{FlowLaunchOptions, MessagingApi},
    },
};

// ---------------------------------------------------------------- user store

#[derive(Default)]
pub struct FakeUserStore {
    pub users: Mutex<Vec<user::Model>>,
}

impl FakeUserStore {
    pub fn with_user(phone: &str, address: Option<&str>) -> (Arc<Self>, Uuid) {
        let store = Self::default();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        store.users.lock().unwrap().push(user::Model {
            id: user_id,
            phone_number: phone.to_string(),
            business_name: "Acme Foods".to_string(),
            contact_person: "Ada Obi".to_string(),
            email: "ada@acme.example".to_string(),
            address: address.map(str::to_string),
            nature_of_business: "Food distribution".to_string(),
            registration_number: "RC-12345".to_string(),
            created_at: now,
            updated_at: now,
        });
        (Arc::new(store), user_id)
    }
}

#[async_trait]
impl UserStore for FakeUserStore {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.phone_number == phone)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.id))
    }

    async fn create(&self, input: NewUser) -> Result<user::Model, ServiceError> {
        let now = Utc::now();
        let model = user::Model {
            id: Uuid::new_v4(),
            phone_number: input.phone_number,
            business_name: input.business_name,
            contact_person: input.contact_person,
            email: input.email,
            address: input.address,
            nature_of_business: input.nature_of_business,
            registration_number: input.registration_number,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn exists_by_phone(&self, phone: &str) -> Result<bool, ServiceError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .any(|u| u.phone_number == phone))
    }
}

// ---------------------------------------------------------------- cart store

#[derive(Default)]
pub struct FakeCartStore {
    pub lines: Mutex<Vec<(Uuid, String, i32)>>,
}

#[async_trait]
impl CartStore for FakeCartStore {
    async fn list_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<whatsapp_commerce_api::entities::cart_item::Model>, ServiceError> {
        let now = Utc::now();
        Ok(self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _, _)| *owner == user_id)
            .map(
                |(owner, retailer_id, quantity)| whatsapp_commerce_api::entities::cart_item::Model {
                    id: Uuid::new_v4(),
                    user_id: *owner,
                    product_retailer_id: retailer_id.clone(),
                    quantity: *quantity,
                    created_at: now,
                    updated_at: now,
                },
            )
            .collect())
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        match lines
            .iter_mut()
            .find(|(owner, id, _)| *owner == user_id && id == retailer_id)
        {
            Some(line) => line.2 += quantity,
            None => lines.push((user_id, retailer_id.to_string(), quantity)),
        }
        Ok(())
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        retailer_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let mut lines = self.lines.lock().unwrap();
        if let Some(line) = lines
            .iter_mut()
            .find(|(owner, id, _)| *owner == user_id && id == retailer_id)
        {
            line.2 = quantity;
        }
        Ok(())
    }

    async fn remove_item(&self, user_id: Uuid, retailer_id: &str) -> Result<(), ServiceError> {
        self.lines
            .lock()
            .unwrap()
            .retain(|(owner, id, _)| !(*owner == user_id && id == retailer_id));
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.lines
            .lock()
            .unwrap()
            .retain(|(owner, _, _)| *owner != user_id);
        Ok(())
    }
}

// --------------------------------------------------------------- order store

#[derive(Default)]
pub struct FakeOrderStore {
    pub orders: Mutex<Vec<order::Model>>,
    pub items: Mutex<Vec<order_item::Model>>,
}

#[async_trait]
impl OrderStore for FakeOrderStore {
    async fn create(
        &self,
        user_id: Uuid,
        total_amount: Decimal,
        delivery_address: &str,
        payment_link: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let model = order::Model {
            id: Uuid::new_v4(),
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            delivery_address: delivery_address.to_string(),
            payment_link: payment_link.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.orders.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn add_item(
        &self,
        order_id: Uuid,
        product_retailer_id: &str,
        product_name: &str,
        unit_price: Decimal,
        quantity: i32,
        subtotal: Decimal,
    ) -> Result<(), ServiceError> {
        self.items.lock().unwrap().push(order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            product_retailer_id: product_retailer_id.to_string(),
            product_name: product_name.to_string(),
            unit_price,
            quantity,
            subtotal,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        order.status = status;
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        order.payment_status = status;
        Ok(())
    }

    async fn update_payment_link(&self, id: Uuid, link: &str) -> Result<(), ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        order.payment_link = Some(link.to_string());
        Ok(())
    }
}

// ------------------------------------------------------------------- catalog

pub struct FakeCatalog {
    pub products: HashMap<String, Product>,
}

pub fn product(retailer_id: &str, price: Decimal) -> Product {
    Product {
        id: format!("id-{}", retailer_id),
        retailer_id: retailer_id.to_string(),
        name: format!("Product {}", retailer_id),
        description: None,
        price,
        currency: "NGN".to_string(),
        image_url: None,
        availability: Availability::InStock,
        category: None,
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn get_product(&self, retailer_id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(self.products.get(retailer_id).cloned())
    }

    async fn get_products(
        &self,
        retailer_ids: &[String],
    ) -> Result<HashMap<String, Product>, ServiceError> {
        Ok(retailer_ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let mut products: Vec<Product> = self.products.values().cloned().collect();
        products.sort_by(|a, b| a.retailer_id.cmp(&b.retailer_id));
        Ok(products)
    }
}

// ------------------------------------------------------------------ payments

#[derive(Default)]
pub struct FakePayments {
    pub generated: Mutex<Vec<(Uuid, Decimal, String)>>,
    pub verification: Mutex<Option<PaymentVerification>>,
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn generate_payment_link(
        &self,
        order_id: Uuid,
        amount: Decimal,
        email: &str,
        _metadata: PaymentMetadata,
    ) -> Result<String, ServiceError> {
        self.generated
            .lock()
            .unwrap()
            .push((order_id, amount, email.to_string()));
        Ok(format!("https://pay.test/{}", order_id))
    }

    async fn verify_payment(&self, _reference: &str) -> Result<PaymentVerification, ServiceError> {
        self.verification
            .lock()
            .unwrap()
            .clone()
            .map(Ok)
            .unwrap_or_else(|| Err(ServiceError::PaymentFailed("no verification set".into())))
    }

    fn verify_webhook_signature(&self, _body: &[u8], _signature: &str) -> bool {
        true
    }
}

// ----------------------------------------------------------------- messenger

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub flows: Mutex<Vec<(String, String)>>,
    pub documents: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessagingApi for RecordingMessenger {
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn send_flow(
        &self,
        to: &str,
        flow_id: &str,
        _options: FlowLaunchOptions,
    ) -> Result<(), ServiceError> {
        self.flows
            .lock()
            .unwrap()
            .push((to.to_string(), flow_id.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        to: &str,
        filename: &str,
        _bytes: Vec<u8>,
        _mime_type: &str,
        _caption: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.documents
            .lock()
            .unwrap()
            .push((to.to_string(), filename.to_string()));
        Ok(())
    }

    async fn upload_media(
        &self,
        _bytes: Vec<u8>,
        _filename: &str,
        _mime_type: &str,
    ) -> Result<String, ServiceError> {
        Ok("media-1".to_string())
    }

    async fn send_typing(&self, _to: &str, _message_id: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    fn verify_webhook(&self, mode: &str, token: &str, challenge: &str) -> Option<String> {
        (mode == "subscribe" && token == "test-verify-token").then(|| challenge.to_string())
    }
}

// ------------------------------------------------------------------- harness

pub struct TestHarness {
    pub chatbot: ChatbotService,
    pub order_flow: OrderFlow,
    pub user_store: Arc<FakeUserStore>,
    pub cart_store: Arc<FakeCartStore>,
    pub order_store: Arc<FakeOrderStore>,
    pub payments: Arc<FakePayments>,
    pub messenger: Arc<RecordingMessenger>,
}

impl TestHarness {
    pub fn new(user_store: Arc<FakeUserStore>, products: Vec<Product>) -> Self {
        let cart_store = Arc::new(FakeCartStore::default());
        let order_store = Arc::new(FakeOrderStore::default());
        let payments = Arc::new(FakePayments::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let catalog = Arc::new(FakeCatalog {
            products: products
                .into_iter()
                .map(|p| (p.retailer_id.clone(), p))
                .collect(),
        });

        let (tx, _rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(tx));

        let user_service = UserService::new(
            user_store.clone(),
            event_sender.clone(),
            Duration::from_secs(60),
        );
        let cart_service = CartService::new(
            cart_store.clone(),
            catalog.clone(),
            event_sender.clone(),
        );
        let order_service =
            OrderService::new(order_store.clone(), cart_service.clone(), event_sender);

        let onboarding_flow = OnboardingFlow::new(messenger.clone(), "flow-1".to_string());
        let cart_flow = CartFlow::new(catalog, cart_service.clone());
        let order_flow = OrderFlow::new(
            order_service.clone(),
            user_service.clone(),
            payments.clone(),
            messenger.clone(),
            DocumentService::new(),
        );

        let chatbot = ChatbotService::new(
            user_service,
            cart_service,
            order_service,
            payments.clone(),
            onboarding_flow,
            cart_flow,
            order_flow.clone(),
            SessionStore::new(Duration::from_secs(1800)),
        );

        Self {
            chatbot,
            order_flow,
            user_store,
            cart_store,
            order_store,
            payments,
            messenger,
        }
    }
}

// ----------------------------------------------------------- message helpers

pub fn text_message(from: &str, body: &str) -> InboundMessage {
    parse_message(serde_json::json!({
        "from": from,
        "id": format!("wamid.{}", Uuid::new_v4()),
        "type": "text",
        "text": {"body": body}
    }))
}

pub fn button_message(from: &str, button_id: &str) -> InboundMessage {
    parse_message(serde_json::json!({
        "from": from,
        "id": format!("wamid.{}", Uuid::new_v4()),
        "type": "interactive",
        "interactive": {
            "type": "button_reply",
            "button_reply": {"id": button_id, "title": "Button"}
        }
    }))
}

pub fn list_message(from: &str, row_id: &str) -> InboundMessage {
    parse_message(serde_json::json!({
        "from": from,
        "id": format!("wamid.{}", Uuid::new_v4()),
        "type": "interactive",
        "interactive": {
            "type": "list_reply",
            "list_reply": {"id": row_id, "title": "Row"}
        }
    }))
}

pub fn order_message(from: &str, items: &[(&str, i64)]) -> InboundMessage {
    let product_items: Vec<serde_json::Value> = items
        .iter()
        .map(|(retailer_id, quantity)| {
            serde_json::json!({"product_retailer_id": retailer_id, "quantity": quantity})
        })
        .collect();
    parse_message(serde_json::json!({
        "from": from,
        "id": format!("wamid.{}", Uuid::new_v4()),
        "type": "order",
        "order": {"catalog_id": "cat-1", "product_items": product_items}
    }))
}

fn parse_message(value: serde_json::Value) -> InboundMessage {
    serde_json::from_value(value).expect("valid inbound message")
}

pub fn webhook_payload(messages: Vec<serde_json::Value>) -> WebhookPayload {
    serde_json::from_value(serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{"id": "e1", "changes": [{"field": "messages", "value": {
            "messaging_product": "whatsapp",
            "messages": messages
        }}]}]
    }))
    .expect("valid webhook payload")
}

/// Collapses an outbound message to its visible text, for assertions.
pub fn message_text(message: &OutboundMessage) -> String {
    match message {
        OutboundMessage::Text { body, .. } => body.clone(),
        OutboundMessage::Interactive { interactive, .. } => {
            use whatsapp_commerce_api::models::outbound::Interactive;
            match interactive {
                Interactive::Buttons { body, .. }
                | Interactive::List { body, .. }
                | Interactive::CtaUrl { body, .. }
                | Interactive::Flow { body, .. } => body.clone(),
            }
        }
        OutboundMessage::Catalog { body, .. } => body.clone(),
        OutboundMessage::Template { .. } => String::new(),
        OutboundMessage::Document { filename, .. } => filename.clone(),
    }
}

pub fn button_ids(message: &OutboundMessage) -> Vec<String> {
    use whatsapp_commerce_api::models::outbound::Interactive;
    match message {
        OutboundMessage::Interactive {
            interactive: Interactive::Buttons { buttons, .. },
            ..
        } => buttons.iter().map(|b| b.id.clone()).collect(),
        OutboundMessage::Interactive {
            interactive: Interactive::List { sections, .. },
            ..
        } => sections
            .iter()
            .flat_map(|s| s.rows.iter().map(|r| r.id.clone()))
            .collect(),
        _ => Vec::new(),
    }
}
