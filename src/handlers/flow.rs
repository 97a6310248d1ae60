use crate::{errors::FlowEndpointError, flow::FlowEnvelope, AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::info;

// POST /flow
//
// The response body is the base64 ciphertext as text/plain, not JSON.
// Decryption failures answer 421 so the WhatsApp client re-runs its key
// exchange.
#[utoipa::path(
    post,
    path = "/flow",
    request_body = FlowEnvelope,
    responses(
        (status = 200, description = "Encrypted Flow response (base64)", body = String, content_type = "text/plain"),
        (status = 421, description = "Decryption failed")
    ),
    tag = "flow"
)]
pub async fn handle_flow(
    State(state): State<AppState>,
    Json(envelope): Json<FlowEnvelope>,
) -> Result<impl IntoResponse, FlowEndpointError> {
    info!("Received Flow request");

    let decrypted = state.flow_crypto.decrypt_request(&envelope)?;
    let response = state.flow_processor.process(&decrypted.payload).await;
    let encrypted =
        state
            .flow_crypto
            .encrypt_response(&decrypted.aes_key, &decrypted.iv, &response)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        encrypted,
    ))
}
