//! WhatsApp Commerce API Library
//!
//! This crate provides the core functionality for the WhatsApp commerce
//! assistant: the conversational dialogue controller, the encrypted Flow
//! onboarding exchange, and the cart/order/payment engines behind them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod chatbot;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod flow;
pub mod handlers;
pub mod message_queue;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::OpenApi;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub whatsapp: Arc<dyn services::whatsapp::MessagingApi>,
    pub payments: Arc<dyn services::payments::PaymentGateway>,
    pub order_service: services::orders::OrderService,
    pub order_flow: chatbot::flows::OrderFlow,
    pub queue: message_queue::WebhookQueue,
    pub flow_crypto: Arc<flow::FlowCryptoService>,
    pub flow_processor: flow::FlowScreenProcessor,
}

/// Assembles the HTTP surface: webhook ingestion, the encrypted Flow
/// endpoint, and the payment callbacks.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "whatsapp-commerce-api up" }))
        .route("/health", get(health_check))
        .route(
            "/webhook/whatsapp",
            get(handlers::webhook::verify_webhook).post(handlers::webhook::receive_webhook),
        )
        .route("/flow", post(handlers::flow::handle_flow))
        .route(
            "/webhook/payment/verify",
            get(handlers::payment_webhook::verify_payment),
        )
        .route(
            "/webhook/payment",
            post(handlers::payment_webhook::payment_event),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
