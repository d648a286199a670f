//! EcoQuest gateway
//!
//! - Axum JSON API for the EcoQuest frontend (missions, trophies, leaderboards, profile)
//! - Supabase for auth, Postgres REST and storage
//! - Gemini vision verification of photo evidence
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   SUPABASE_URL          : backend project URL
//!   SUPABASE_ANON_KEY     : public anon key
//!   GEMINI_API_KEY        : enables photo verification if present
//!   GEMINI_BASE_URL       : default "https://generativelanguage.googleapis.com/v1beta/models"
//!   GEMINI_MODEL          : default "gemini-2.0-flash"
//!   ECOQUEST_CONFIG_PATH  : path to TOML config
//!   ECOQUEST_CONTENT_ROOT : directory backing content:// image handles
//!   ECOQUEST_SESSION_PATH : where the signed-in session is kept between restarts
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod session;
mod supabase;
mod image;
mod gemini;
mod quiz;
mod repo;
mod screens;
mod flow;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::load();
  if cfg.backend.url.is_empty() {
    return Err("SUPABASE_URL is not set (env or [backend].url in the config file)".into());
  }

  let state = Arc::new(AppState::from_config(&cfg)?);
  state.spawn_session_watch();
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "ecoquest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!(target: "ecoquest", "Shutting down");
  }
}
