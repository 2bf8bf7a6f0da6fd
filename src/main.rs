//! Streamer Display · live trivia stream screens
//!
//! - Push channel (WebSocket) + HTTP client towards the game server
//! - One controller task owning all display state
//! - Axum HTTP + WebSocket surface for the browser source and control panel
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   BACKEND_URL          : game server base URL (default "http://localhost:5000")
//!   PUSH_URL             : push channel URL (default derived from BACKEND_URL)
//!   STREAMER_CONFIG_PATH : path to TOML config (goals, feed limits, timeouts)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod protocol;
mod channel;
mod timer;
mod resolver;
mod scoring;
mod views;
mod dashboard;
mod backend;
mod controller;
mod state;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::info;

use crate::backend::BackendClient;
use crate::channel::EventChannel;
use crate::controller::Controller;
use crate::routes::build_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = config::load_config_from_env();
  info!(
    target: "streamer_display",
    backend = %config.backend_url,
    push = %config.push_url(),
    port = config.port,
    "Starting streamer display"
  );

  // Upstream: HTTP client + push channel. A failed push connect is logged
  // inside the channel and the display keeps running without live events.
  let backend = BackendClient::new(&config.backend_url, Duration::from_secs(config.request_timeout_secs))?;
  let channel = EventChannel::connect(config.push_url());

  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  let (controller, state) = Controller::new(config, channel, backend);
  tokio::spawn(controller.run());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(Arc::new(state));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "streamer_display", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "streamer_display", "Shutdown requested");
    })
    .await?;
  Ok(())
}
