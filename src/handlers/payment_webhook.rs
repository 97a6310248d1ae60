use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub reference: Option<String>,
}

// GET /webhook/payment/verify
//
// Browser-facing callback the gateway redirects to after checkout. Verifies
// the transaction, marks the order paid, and pushes the receipt to the
// buyer's WhatsApp. The HTML is what the buyer sees in their browser.
#[utoipa::path(
    get,
    path = "/webhook/payment/verify",
    params(("reference" = Option<String>, Query, description = "Order id used as gateway reference")),
    responses(
        (status = 200, description = "Payment verified", body = String, content_type = "text/html"),
        (status = 400, description = "Missing or malformed reference", body = String, content_type = "text/html"),
        (status = 500, description = "Verification failed", body = String, content_type = "text/html")
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    let Some(reference) = query.reference.filter(|r| !r.is_empty()) else {
        warn!("Payment verification called without reference");
        return (
            StatusCode::BAD_REQUEST,
            Html(failure_page("Invalid payment reference.", None)),
        );
    };
    info!(%reference, "Payment verification callback received");

    let Ok(order_id) = reference.parse::<Uuid>() else {
        warn!(%reference, "Reference is not an order id");
        return (
            StatusCode::BAD_REQUEST,
            Html(failure_page("Invalid payment reference.", Some(&reference))),
        );
    };

    let verification = match state.payments.verify_payment(&reference).await {
        Ok(verification) => verification,
        Err(e) => {
            error!(%reference, "Payment verification failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(failure_page(
                    "An error occurred while verifying your payment.",
                    Some(&reference),
                )),
            );
        }
    };

    match verification.phone_number.as_deref() {
        Some(phone_number) => {
            // Receipt delivery and menu re-presentation ride the regular
            // chat pipeline.
            let replies = state
                .order_flow
                .handle_payment_confirmation(phone_number, order_id)
                .await;
            for reply in &replies {
                if let Err(e) = state.whatsapp.send_message(reply).await {
                    warn!(%phone_number, "Failed to send confirmation reply: {}", e);
                }
            }
        }
        None => {
            // No phone in the gateway metadata; still record the payment.
            warn!(%order_id, "Verification metadata carries no phone number");
            if let Err(e) = state.order_service.mark_paid(order_id).await {
                error!(%order_id, "Failed to mark order paid: {}", e);
            }
        }
    }

    (
        StatusCode::OK,
        Html(success_page(&reference, &format!("{:.2}", verification.amount))),
    )
}

// POST /webhook/payment
//
// Server-to-server gateway events, HMAC-signed over the raw body. Only
// `charge.success` is acted on; everything else is acknowledged.
#[utoipa::path(
    post,
    path = "/webhook/payment",
    request_body = String,
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Invalid signature"),
        (status = 400, description = "Malformed payload")
    ),
    tag = "payments"
)]
pub async fn payment_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state.payments.verify_webhook_signature(&body, signature) {
        warn!("Payment webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let json: Value = match serde_json::from_slice(&body) {
        Ok(json) => json,
        Err(e) => {
            warn!("Payment webhook payload is not JSON: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    let event = json.get("event").and_then(Value::as_str).unwrap_or_default();
    if event != "charge.success" {
        info!(%event, "Ignoring payment webhook event");
        return (StatusCode::OK, "ok");
    }

    let reference = json
        .pointer("/data/reference")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Ok(order_id) = reference.parse::<Uuid>() else {
        warn!(%reference, "charge.success with unrecognized reference");
        return (StatusCode::OK, "ok");
    };

    let phone_number = json
        .pointer("/data/metadata/phone_number")
        .and_then(Value::as_str)
        .map(str::to_string);

    info!(%order_id, "Processing charge.success event");
    match phone_number {
        Some(phone_number) => {
            let replies = state
                .order_flow
                .handle_payment_confirmation(&phone_number, order_id)
                .await;
            for reply in &replies {
                if let Err(e) = state.whatsapp.send_message(reply).await {
                    warn!(%phone_number, "Failed to send confirmation reply: {}", e);
                }
            }
        }
        None => {
            if let Err(e) = state.order_service.mark_paid(order_id).await {
                error!(%order_id, "Failed to mark order paid: {}", e);
            }
        }
    }

    (StatusCode::OK, "ok")
}

fn success_page(reference: &str, amount: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Payment Successful</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
      body {{
        font-family: Arial, sans-serif;
        text-align: center;
        padding: 50px;
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        color: white;
      }}
      .success {{ color: #4caf50; background: white; padding: 30px; border-radius: 10px; }}
      h1 {{ margin-bottom: 20px; }}
      p {{ font-size: 18px; }}
    </style>
  </head>
  <body>
    <div class="success">
      <h1>✅ Payment Successful!</h1>
      <p>Your payment of ₦{amount} has been confirmed.</p>
      <p>Order Reference: <strong>{reference}</strong></p>
      <p>You will receive a confirmation message on WhatsApp shortly.</p>
    </div>
  </body>
</html>"#
    )
}

fn failure_page(message: &str, reference: Option<&str>) -> String {
    let reference_line = reference
        .map(|r| format!("<p>Please contact support with reference: <strong>{}</strong></p>", r))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Payment Verification Failed</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
      body {{ font-family: Arial, sans-serif; text-align: center; padding: 50px; }}
      .error {{ color: #d32f2f; }}
    </style>
  </head>
  <body>
    <h1 class="error">❌ Payment Verification Failed</h1>
    <p>{message}</p>
    {reference_line}
  </body>
</html>"#
    )
}
