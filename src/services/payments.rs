//! Paystack payment gateway adapter.
//!
//! The gateway works in minor currency units (kobo), so every amount is
//! converted from the decimal major unit and validated before it leaves the
//! process. Without a configured secret key the adapter degrades to
//! deterministic placeholder links so development environments work without
//! credentials.

use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha512;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// Correlation data round-tripped through the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub phone_number: String,
}

/// Result of verifying a transaction with the gateway
#[derive(Debug, Clone)]
pub struct PaymentVerification {
    /// Amount in major units
    pub amount: Decimal,
    pub phone_number: Option<String>,
    pub paid_at: Option<String>,
}

/// Converts a major-unit amount to the gateway's integer minor units.
/// Rejects non-positive amounts before any network call is made.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::InvalidInput(
            "Invalid order amount for payment. Amount must be > 0.".to_string(),
        ));
    }

    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("Order amount {} out of range", amount))
        })
}

/// Converts gateway minor units back to a major-unit decimal.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::from(minor) / Decimal::from(100)
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn generate_payment_link(
        &self,
        order_id: Uuid,
        amount: Decimal,
        email: &str,
        metadata: PaymentMetadata,
    ) -> Result<String, ServiceError>;

    async fn verify_payment(&self, reference: &str)
        -> Result<PaymentVerification, ServiceError>;

    /// Verifies the HMAC-SHA512 signature on a gateway event webhook.
    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool;
}

pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
    app_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct VerifyData {
    amount: i64,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    paid_at: Option<String>,
}

impl PaystackClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        secret_key: Option<String>,
        app_base_url: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            secret_key,
            app_base_url,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    #[instrument(skip(self, metadata), fields(%order_id))]
    async fn generate_payment_link(
        &self,
        order_id: Uuid,
        amount: Decimal,
        email: &str,
        metadata: PaymentMetadata,
    ) -> Result<String, ServiceError> {
        let Some(secret_key) = &self.secret_key else {
            warn!("Paystack secret key not configured, returning placeholder link");
            return Ok(format!("https://payment.example.com/pay/{}", order_id));
        };

        let amount_in_kobo = to_minor_units(amount)?;
        let callback_url = self
            .app_base_url
            .as_ref()
            .map(|base| format!("{}/webhook/payment/verify", base));

        info!(
            %amount,
            amount_in_kobo,
            callback = callback_url.as_deref().unwrap_or("not set"),
            "Initializing Paystack payment"
        );

        let mut body = json!({
            "email": email,
            "amount": amount_in_kobo,
            "reference": order_id.to_string(),
            "metadata": metadata,
        });
        if let Some(url) = callback_url {
            body["callback_url"] = json!(url);
        }

        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("paystack request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Paystack API error: {}", text);
            return Err(ServiceError::PaymentFailed(format!(
                "Failed to generate payment link: {}",
                status
            )));
        }

        let envelope: PaystackEnvelope<InitializeData> = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("paystack body: {}", e)))?;

        match envelope.data {
            Some(data) if envelope.status => Ok(data.authorization_url),
            _ => Err(ServiceError::PaymentFailed(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to generate payment link".to_string()),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn verify_payment(
        &self,
        reference: &str,
    ) -> Result<PaymentVerification, ServiceError> {
        let Some(secret_key) = &self.secret_key else {
            warn!("Paystack secret key not configured, returning placeholder verification");
            return Ok(PaymentVerification {
                amount: Decimal::ZERO,
                phone_number: None,
                paid_at: None,
            });
        };

        let response = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("paystack verify: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Paystack verify API error: {}", text);
            return Err(ServiceError::PaymentFailed(format!(
                "Failed to verify payment: {}",
                status
            )));
        }

        let envelope: PaystackEnvelope<VerifyData> = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("paystack body: {}", e)))?;

        let data = match envelope.data {
            Some(data) if envelope.status => data,
            _ => {
                return Err(ServiceError::PaymentFailed(
                    envelope
                        .message
                        .unwrap_or_else(|| "Failed to verify payment".to_string()),
                ))
            }
        };

        let phone_number = data
            .metadata
            .as_ref()
            .and_then(|m| m.get("phone_number"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(PaymentVerification {
            amount: from_minor_units(data.amount),
            phone_number,
            paid_at: data.paid_at,
        })
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        let Some(secret_key) = &self.secret_key else {
            return false;
        };

        let mut mac = match HmacSha512::new_from_slice(secret_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(&expected, signature)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
