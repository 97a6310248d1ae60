//! Outbound WhatsApp (Graph API) messaging adapter.
//!
//! Maps the typed [`OutboundMessage`] descriptors onto Graph API JSON and
//! owns media upload for document delivery. Sends are not retried here;
//! callers decide whether a failed send is fatal for their flow.

use crate::{
    errors::ServiceError,
    models::outbound::{Interactive, OutboundMessage},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

/// Options for launching a published Flow
#[derive(Debug, Clone)]
pub struct FlowLaunchOptions {
    pub header_text: Option<String>,
    pub body_text: String,
    pub footer_text: Option<String>,
    pub flow_cta: String,
    pub flow_token: String,
    pub screen: String,
}

#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), ServiceError>;

    async fn send_flow(
        &self,
        to: &str,
        flow_id: &str,
        options: FlowLaunchOptions,
    ) -> Result<(), ServiceError>;

    /// Uploads the bytes and sends them as a document attachment.
    async fn send_document(
        &self,
        to: &str,
        filename: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<(), ServiceError>;

    async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, ServiceError>;

    /// Marks the message read and shows a typing indicator. Best effort.
    async fn send_typing(&self, to: &str, message_id: &str) -> Result<(), ServiceError>;

    /// Webhook subscription challenge: echoes the challenge on token match.
    fn verify_webhook(&self, mode: &str, token: &str, challenge: &str) -> Option<String>;
}

pub struct WhatsAppClient {
    http: reqwest::Client,
    api_url: String,
    phone_number_id: String,
    access_token: String,
    verify_token: String,
    catalog_id: Option<String>,
}

impl WhatsAppClient {
    pub fn new(
        http: reqwest::Client,
        api_url: String,
        phone_number_id: String,
        access_token: String,
        verify_token: String,
        catalog_id: Option<String>,
    ) -> Self {
        Self {
            http,
            api_url,
            phone_number_id,
            access_token,
            verify_token,
            catalog_id,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_url, self.phone_number_id)
    }

    async fn post_payload(&self, payload: Value) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("whatsapp send: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Failed to send WhatsApp message: {}", body);
            return Err(ServiceError::ExternalServiceError(format!(
                "Failed to send WhatsApp message: {}",
                status
            )));
        }

        let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
        let message_id = body
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(%message_id, "Message accepted by Graph API");
        Ok(())
    }
}

/// Maps an outbound descriptor to its Graph API payload.
/// Kept free of I/O so the wire shapes are unit-testable.
pub fn build_message_payload(
    message: &OutboundMessage,
    default_catalog_id: Option<&str>,
) -> Result<Value, ServiceError> {
    let base = |to: &str, kind: &str| {
        json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": kind,
        })
    };

    let payload = match message {
        OutboundMessage::Text {
            to,
            body,
            preview_url,
        } => {
            let mut payload = base(to, "text");
            payload["text"] = json!({"preview_url": preview_url, "body": body});
            payload
        }
        OutboundMessage::Interactive { to, interactive } => {
            let mut payload = base(to, "interactive");
            payload["interactive"] = build_interactive(interactive);
            payload
        }
        OutboundMessage::Template { to, template } => {
            let mut payload = base(to, "template");
            payload["template"] = template.clone();
            payload
        }
        OutboundMessage::Catalog {
            to,
            body,
            thumbnail_product_retailer_id,
        } => {
            let catalog_id = default_catalog_id.ok_or_else(|| {
                ServiceError::InvalidOperation(
                    "Catalog ID is required for catalog messages".to_string(),
                )
            })?;

            let mut action = json!({
                "name": "catalog_message",
                "catalog_id": catalog_id,
            });
            if let Some(thumbnail) = thumbnail_product_retailer_id {
                action["parameters"] =
                    json!({"thumbnail_product_retailer_id": thumbnail});
            }

            let mut payload = base(to, "interactive");
            payload["interactive"] = json!({
                "type": "catalog_message",
                "body": {"text": body},
                "action": action,
            });
            payload
        }
        OutboundMessage::Document {
            to,
            media_id,
            filename,
            caption,
        } => {
            let mut document = json!({"id": media_id, "filename": filename});
            if let Some(caption) = caption {
                document["caption"] = json!(caption);
            }
            let mut payload = base(to, "document");
            payload["document"] = document;
            payload
        }
    };

    Ok(payload)
}

fn build_interactive(interactive: &Interactive) -> Value {
    match interactive {
        Interactive::Buttons { body, buttons } => {
            let buttons: Vec<Value> = buttons
                .iter()
                .map(|b| json!({"type": "reply", "reply": {"id": b.id, "title": b.title}}))
                .collect();
            json!({
                "type": "button",
                "body": {"text": body},
                "action": {"buttons": buttons},
            })
        }
        Interactive::List {
            body,
            button,
            sections,
        } => {
            let sections: Vec<Value> = sections
                .iter()
                .map(|section| {
                    let rows: Vec<Value> = section
                        .rows
                        .iter()
                        .map(|row| {
                            let mut value = json!({"id": row.id, "title": row.title});
                            if let Some(description) = &row.description {
                                value["description"] = json!(description);
                            }
                            value
                        })
                        .collect();
                    let mut value = json!({"rows": rows});
                    if let Some(title) = &section.title {
                        value["title"] = json!(title);
                    }
                    value
                })
                .collect();
            json!({
                "type": "list",
                "body": {"text": body},
                "action": {"button": button, "sections": sections},
            })
        }
        Interactive::CtaUrl {
            header,
            body,
            footer,
            display_text,
            url,
        } => {
            let mut value = json!({
                "type": "cta_url",
                "body": {"text": body},
                "action": {
                    "name": "cta_url",
                    "parameters": {"display_text": display_text, "url": url},
                },
            });
            if let Some(header) = header {
                value["header"] = json!({"type": "text", "text": header});
            }
            if let Some(footer) = footer {
                value["footer"] = json!({"text": footer});
            }
            value
        }
        Interactive::Flow {
            header,
            body,
            footer,
            cta,
            flow_id,
            flow_token,
            screen,
        } => {
            let mut value = json!({
                "type": "flow",
                "body": {"text": body},
                "action": {
                    "name": "flow",
                    "parameters": {
                        "flow_message_version": "3",
                        "flow_token": flow_token,
                        "flow_id": flow_id,
                        "flow_cta": cta,
                        "flow_action": "navigate",
                        "flow_action_payload": {"screen": screen},
                    },
                },
            });
            if let Some(header) = header {
                value["header"] = json!({"type": "text", "text": header});
            }
            if let Some(footer) = footer {
                value["footer"] = json!({"text": footer});
            }
            value
        }
    }
}

#[async_trait]
impl MessagingApi for WhatsAppClient {
    #[instrument(skip(self, message), fields(to = message.recipient()))]
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), ServiceError> {
        let payload = build_message_payload(message, self.catalog_id.as_deref())?;
        self.post_payload(payload).await
    }

    #[instrument(skip(self, options))]
    async fn send_flow(
        &self,
        to: &str,
        flow_id: &str,
        options: FlowLaunchOptions,
    ) -> Result<(), ServiceError> {
        let message = OutboundMessage::Interactive {
            to: to.to_string(),
            interactive: Interactive::Flow {
                header: options.header_text,
                body: options.body_text,
                footer: options.footer_text,
                cta: options.flow_cta,
                flow_id: flow_id.to_string(),
                flow_token: options.flow_token,
                screen: options.screen,
            },
        };
        self.send_message(&message).await
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn send_document(
        &self,
        to: &str,
        filename: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<(), ServiceError> {
        let media_id = self.upload_media(bytes, filename, mime_type).await?;
        let message = OutboundMessage::Document {
            to: to.to_string(),
            media_id,
            filename: filename.to_string(),
            caption: caption.map(str::to_string),
        };
        self.send_message(&message).await
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, ServiceError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| ServiceError::InvalidInput(format!("invalid mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/{}/media", self.api_url, self.phone_number_id))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("media upload: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Media upload failed: {}", body);
            return Err(ServiceError::ExternalServiceError(format!(
                "Media upload failed: {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("media upload body: {}", e)))?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("media upload returned no id".to_string())
            })
    }

    #[instrument(skip(self))]
    async fn send_typing(&self, to: &str, message_id: &str) -> Result<(), ServiceError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
            "typing_indicator": {"type": "text"},
        });

        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("typing indicator: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Typing indicator rejected");
        }
        Ok(())
    }

    fn verify_webhook(&self, mode: &str, token: &str, challenge: &str) -> Option<String> {
        if mode == "subscribe" && token == self.verify_token {
            info!("Webhook verified successfully");
            Some(challenge.to_string())
        } else {
            warn!("Webhook verification failed");
            None
        }
    }
}
