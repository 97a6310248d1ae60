//! Inbound WhatsApp webhook wire types.
//!
//! The Graph API delivers a deeply nested envelope:
//! `{entry: [{changes: [{value: {messages?, statuses?}}]}]}`. Deserialization
//! is deliberately permissive (unknown fields ignored, most fields optional)
//! so a delivery never bounces on payload variations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookChange {
    pub value: WebhookValue,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<InboundMessage>>,
    /// Delivery receipts; acknowledged but not processed
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub statuses: Option<Vec<serde_json::Value>>,
}

/// Discriminator of an inbound message. Everything the dialogue controller
/// does not handle collapses into `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Interactive,
    Order,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<InboundInteractive>,
    #[serde(default)]
    pub order: Option<InboundOrder>,
    #[serde(default)]
    pub context: Option<MessageContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveKind {
    ButtonReply,
    ListReply,
    NfmReply,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundInteractive {
    #[serde(rename = "type")]
    pub kind: InteractiveKind,
    #[serde(default)]
    pub button_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub list_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub nfm_reply: Option<NfmReply>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InteractiveReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Native Flow completion payload; carried in the DTO but not routed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NfmReply {
    #[serde(default)]
    pub response_json: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Native WhatsApp commerce order submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundOrder {
    #[serde(default)]
    pub catalog_id: Option<String>,
    #[serde(default)]
    pub product_items: Vec<OrderProductItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderProductItem {
    pub product_retailer_id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub item_price: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl OrderProductItem {
    /// Submitted quantity, clamped to at least one unit.
    pub fn quantity_or_default(&self) -> i32 {
        match self.quantity {
            Some(q) if q > 0 => i32::try_from(q).unwrap_or(i32::MAX),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageContext {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub referred_product: Option<ReferredProduct>,
}

/// Present when the user replied to a catalog product ad
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferredProduct {
    #[serde(default)]
    pub catalog_id: Option<String>,
    #[serde(default)]
    pub product_retailer_id: Option<String>,
}

impl WebhookPayload {
    /// Flattens the envelope into the messages the dialogue controller
    /// consumes, skipping structurally incomplete entries.
    pub fn extract_messages(&self) -> Vec<InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter_map(|change| change.value.messages.as_ref())
            .flatten()
            .cloned()
            .collect()
    }
}
