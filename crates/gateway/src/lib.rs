//! HTTP gateway for AgentBridge.
//!
//! Exposes an OpenAI-compatible surface over stateful agents:
//! chat completions (plain and SSE), the model list, a health probe and,
//! when enabled, a debug view of overlay sessions.
//!
//! Built on Axum; the `Bridge` is constructed once and shared as state.

pub mod chat;
pub mod openai;

#[cfg(test)]
mod test_backend;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use agentbridge_backend::LettaClient;
use agentbridge_bridge::{Bridge, OverlayDebugDump};
use agentbridge_config::AppConfig;
use agentbridge_core::error::Error;

use crate::chat::ApiError;
use crate::openai::ModelList;

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub bridge: Arc<Bridge>,
}

pub type SharedState = Arc<AppState>;

/// Build the router.
///
/// Layers applied:
/// - Request body size limit from `gateway.body_limit_bytes`
/// - CORS for the configured origins (none by default)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let gateway = &state.config.gateway;

    let mut router = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models_handler))
        .route("/health", get(health_handler));

    if gateway.debug_sessions {
        info!("Session debug endpoint enabled at /debug/sessions");
        router = router.route("/debug/sessions", get(debug_sessions_handler));
    }

    let mut router = router
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&gateway.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let backend = Arc::new(LettaClient::from_config(&config.backend)?);
    let bridge = Arc::new(Bridge::new(backend, &config));
    bridge.warm_up().await;

    let app = build_router(Arc::new(AppState { config, bridge }));

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    backend_url: String,
    agents_loaded: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend_url: state.config.backend.base_url.clone(),
        agents_loaded: state.bridge.directory().len(),
    })
}

async fn models_handler(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let directory = state.bridge.directory();
    directory.refresh().await.map_err(Error::Backend)?;
    Ok(Json(ModelList::from_names(directory.names())).into_response())
}

async fn debug_sessions_handler(State(state): State<SharedState>) -> Json<OverlayDebugDump> {
    Json(state.bridge.debug_dump())
}
