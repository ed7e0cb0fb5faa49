// Library interface for chat_relay
// Exposes the relay router so tests and other binaries can mount it

pub mod config;
pub mod metrics;
pub mod page;
pub mod websocket;

pub use config::{RelayConfig, Variant};
pub use metrics::ServerMetrics;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{State, ws::WebSocketUpgrade},
    response::{Html, IntoResponse},
    routing::get,
};
use relay_core::Relay;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            relay: Arc::new(config.build_relay()),
            metrics: Arc::new(ServerMetrics::new()),
            config: Arc::new(config),
        }
    }
}

/// Adds a unique request ID to each HTTP request span
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/api/history", get(history))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the relay on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn chat_page(State(state): State<AppState>) -> impl IntoResponse {
    Html(page::chat_page(state.config.max_message_bytes).into_string())
}

async fn websocket_handler(
    mut ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Oversized frames fail in the transport and end that client's connection
    if let Some(limit) = state.config.max_message_bytes {
        ws = ws.max_message_size(limit).max_frame_size(limit);
    }
    ws.on_upgrade(move |socket| websocket::handle_websocket(socket, state))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        variant: state.config.variant,
        clients: state.relay.client_count().await as u64,
        history_len: state.relay.history_len().await as u64,
        uptime_secs: snapshot.uptime_secs,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

async fn history(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.relay.history_snapshot().await.unwrap_or_default();
    debug!(records = records.len(), "History requested");
    Json(records)
}
