use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{signal, sync::mpsc};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use whatsapp_commerce_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = Arc::new(api::db::establish_connection(&cfg.database_url).await?);

    // Domain events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Shared outbound HTTP client with conservative timeouts; a stuck
    // upstream call fails the one message being processed, not the worker.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .build()?;

    // External adapters
    let whatsapp: Arc<dyn api::services::whatsapp::MessagingApi> =
        Arc::new(api::services::whatsapp::WhatsAppClient::new(
            http.clone(),
            cfg.whatsapp.api_url.clone(),
            cfg.whatsapp.phone_number_id.clone(),
            cfg.whatsapp.access_token.clone(),
            cfg.whatsapp.verify_token.clone(),
            cfg.whatsapp.catalog_id.clone(),
        ));
    let catalog: Arc<dyn api::services::catalog::CatalogApi> =
        Arc::new(api::services::catalog::MetaCatalogClient::new(
            http.clone(),
            cfg.whatsapp.api_url.clone(),
            cfg.whatsapp.access_token.clone(),
            cfg.whatsapp.catalog_id.clone(),
        ));
    let payments: Arc<dyn api::services::payments::PaymentGateway> =
        Arc::new(api::services::payments::PaystackClient::new(
            http,
            cfg.paystack.base_url.clone(),
            cfg.paystack.secret_key.clone(),
            cfg.paystack.app_base_url.clone(),
        ));

    // Stores and engines
    let user_store = Arc::new(api::repositories::SeaOrmUserStore::new(db.clone()));
    let cart_store = Arc::new(api::repositories::SeaOrmCartStore::new(db.clone()));
    let order_store = Arc::new(api::repositories::SeaOrmOrderStore::new(db.clone()));

    let user_service = api::services::users::UserService::new(
        user_store,
        event_sender.clone(),
        Duration::from_secs(cfg.user_cache_ttl_secs),
    );
    let cart_service = api::services::cart::CartService::new(
        cart_store,
        catalog.clone(),
        event_sender.clone(),
    );
    let order_service = api::services::orders::OrderService::new(
        order_store,
        cart_service.clone(),
        event_sender.clone(),
    );
    let documents = api::services::documents::DocumentService::new();

    // Conversation flows
    let onboarding_flow = api::chatbot::flows::OnboardingFlow::new(
        whatsapp.clone(),
        cfg.whatsapp.onboarding_flow_id.clone(),
    );
    let cart_flow =
        api::chatbot::flows::CartFlow::new(catalog.clone(), cart_service.clone());
    let order_flow = api::chatbot::flows::OrderFlow::new(
        order_service.clone(),
        user_service.clone(),
        payments.clone(),
        whatsapp.clone(),
        documents,
    );

    let sessions =
        api::chatbot::session::SessionStore::new(Duration::from_secs(cfg.session_ttl_secs));
    let chatbot = api::chatbot::ChatbotService::new(
        user_service.clone(),
        cart_service,
        order_service.clone(),
        payments.clone(),
        onboarding_flow,
        cart_flow,
        order_flow.clone(),
        sessions,
    );

    // Webhook queue and worker
    let (queue, queue_rx) = api::message_queue::WebhookQueue::new(cfg.queue_capacity);
    let processor = api::chatbot::processor::WebhookProcessor::new(chatbot, whatsapp.clone());
    tokio::spawn(api::message_queue::run_worker(queue_rx, processor));

    // Encrypted Flow exchange; fatal without a usable private key
    let flow_crypto = Arc::new(api::flow::FlowCryptoService::from_config(&cfg.flow)?);
    let flow_messaging = api::flow::FlowMessaging::new(whatsapp.clone());
    let flow_screens = api::flow::FlowScreens::new(user_service, flow_messaging);
    let flow_processor = api::flow::FlowScreenProcessor::new(flow_screens);

    let app_state = api::AppState {
        db,
        config: cfg.clone(),
        whatsapp,
        payments,
        order_service,
        order_flow,
        queue,
        flow_crypto,
        flow_processor,
    };

    let app = api::app_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("🚀 whatsapp-commerce-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
