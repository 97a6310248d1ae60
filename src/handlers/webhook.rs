use crate::{models::WebhookPayload, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Meta sends the subscription challenge as `hub.*` query parameters.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

// GET /webhook/whatsapp
#[utoipa::path(
    get,
    path = "/webhook/whatsapp",
    params(
        ("hub.mode" = Option<String>, Query, description = "Subscription mode"),
        ("hub.verify_token" = Option<String>, Query, description = "Configured verify token"),
        ("hub.challenge" = Option<String>, Query, description = "Challenge to echo"),
    ),
    responses(
        (status = 200, description = "Challenge echoed"),
        (status = 403, description = "Verification failed")
    ),
    tag = "webhook"
)]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    info!(mode = ?params.mode, "Webhook verification attempt");

    let verified = state.whatsapp.verify_webhook(
        params.mode.as_deref().unwrap_or_default(),
        params.verify_token.as_deref().unwrap_or_default(),
        params.challenge.as_deref().unwrap_or_default(),
    );

    match verified {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => (StatusCode::FORBIDDEN, "verification failed").into_response(),
    }
}

// POST /webhook/whatsapp
#[utoipa::path(
    post,
    path = "/webhook/whatsapp",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Delivery accepted")
    ),
    tag = "webhook"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    info!("Received webhook payload, adding to queue");

    // Immediate read receipt and typing indicator, detached from
    // processing. Failure here is cosmetic.
    if let Some(message) = payload.extract_messages().into_iter().next() {
        let whatsapp = state.whatsapp.clone();
        tokio::spawn(async move {
            if let Err(e) = whatsapp.send_typing(&message.from, &message.id).await {
                warn!("Failed to send typing indicator: {}", e);
            }
        });
    }

    // Meta retries on non-200; a full queue is logged and acknowledged
    // rather than amplified into redelivery storms.
    if let Err(e) = state.queue.enqueue(payload) {
        warn!("Failed to enqueue webhook payload: {}", e);
    }

    (StatusCode::OK, Json(json!({"status": "ok"})))
}
