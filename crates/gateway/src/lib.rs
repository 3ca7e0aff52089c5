//! HTTP gateway for RelayChat.
//!
//! Serves the browser chat page, a health check, and the v1 API that runs
//! conversation turns and streams transcript updates over SSE.
//!
//! Built on Axum.

pub mod api;
pub mod frontend;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use relaychat_agent::{CREDENTIALS_WARNING, ConversationDriver};
use relaychat_config::AppConfig;
use relaychat_core::event::EventBus;

use crate::sessions::SessionStore;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub driver: Arc<ConversationDriver>,
    pub sessions: SessionStore,
    pub event_bus: Arc<EventBus>,
}

impl GatewayState {
    pub fn new(driver: Arc<ConversationDriver>) -> Self {
        let event_bus = driver.event_bus().clone();
        Self {
            driver,
            sessions: SessionStore::new(),
            event_bus,
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: health, v1 API, and the embedded frontend.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api::v1_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The provider, agents, and event bus are built once and shared by every
/// browser session.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let missing = config.llm.missing_credentials();
    if !missing.is_empty() {
        warn!(missing = ?missing, "{CREDENTIALS_WARNING}; turns will be refused until they are set");
    }

    let event_bus = Arc::new(EventBus::default());
    let provider = relaychat_providers::build_from_config(&config.llm);
    let driver = Arc::new(ConversationDriver::from_config(&config, provider, event_bus));

    let app = build_router(Arc::new(GatewayState::new(driver)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
