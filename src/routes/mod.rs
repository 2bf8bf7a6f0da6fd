//! Router assembly: screen routes, streamer actions, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (screen pushes + streamer commands)
/// - Streamer actions under `/api/v1/...`
/// - Screen routes (`/`, `/timer`, ...); any other GET path renders the
///   "No screen" page with a 404 without touching the display
/// - CORS (allow any origin/method/headers) for browser sources
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/screen", get(http::http_get_screen))
        .route("/api/v1/score", post(http::http_post_score))
        .route("/api/v1/scripted_event", post(http::http_post_scripted_event))
        .route("/api/v1/overlay", post(http::http_post_overlay))
        .route("/api/v1/highlight_random", post(http::http_post_highlight_random))
        .route("/api/v1/search", post(http::http_post_search))
        .route("/api/v1/secret_points", post(http::http_post_secret_points))
        .route("/api/v1/admin/:action", post(http::http_post_admin))
        .route("/api/v1/change_host", post(http::http_post_change_host))
        // Screens
        .route("/", get(http::http_route))
        .route("/streamer.html", get(http::http_route))
        .route("/responses", get(http::http_route))
        .route("/leaderboard", get(http::http_route))
        .route("/hosts", get(http::http_route))
        .route("/timer", get(http::http_route))
        .route("/finale", get(http::http_route))
        .fallback(get(http::http_unknown_screen))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
