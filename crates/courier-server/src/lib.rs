//! HTTP server and Axum router for the chat relay.
//!
//! The relay exposes a single `POST /api/chat` endpoint that forwards a
//! conversation to the hosted model API and streams the response back as
//! server-sent events, plus a `GET /health` probe. Router construction is
//! separated from the binary entry point so the integration tests can bind
//! the server on an ephemeral port.

pub mod dto;
mod error;
mod handlers;
mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use courier_config::RelayConfig;
use courier_llm::AnthropicClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared server state accessible from all handlers.
///
/// Built once at startup; request handling never reads the environment.
pub struct ServerState {
    pub config: RelayConfig,
    pub anthropic: AnthropicClient,
}

impl ServerState {
    /// Creates the state from the loaded configuration, sharing one HTTP
    /// client across all upstream calls.
    pub fn new(config: RelayConfig) -> Self {
        let anthropic = AnthropicClient::new(reqwest::Client::new(), &config);
        Self { config, anthropic }
    }
}

/// Builds the relay router with CORS and request tracing.
pub fn router(config: RelayConfig) -> Router {
    let state = Arc::new(ServerState::new(config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/api/chat", post(handlers::chat::chat))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
