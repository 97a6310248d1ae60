use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "WhatsApp Commerce API",
        description = "WhatsApp-based commerce assistant: webhook ingestion, encrypted Flow onboarding, and payment callbacks"
    ),
    paths(
        crate::handlers::webhook::verify_webhook,
        crate::handlers::webhook::receive_webhook,
        crate::handlers::flow::handle_flow,
        crate::handlers::payment_webhook::verify_payment,
        crate::handlers::payment_webhook::payment_event,
    ),
    components(schemas(
        crate::models::webhook::WebhookPayload,
        crate::flow::types::FlowEnvelope,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "webhook", description = "WhatsApp webhook ingestion"),
        (name = "flow", description = "Encrypted WhatsApp Flow exchange"),
        (name = "payments", description = "Payment gateway callbacks"),
    )
)]
pub struct ApiDoc;
