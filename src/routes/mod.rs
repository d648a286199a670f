//! Router assembly: JSON API under `/api/v1`, static frontend, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Base64 photos are larger than axum's default body limit.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/api/v1/health", get(http::http_health))
    // Auth
    .route("/api/v1/auth/signup", post(http::http_signup))
    .route("/api/v1/auth/login", post(http::http_login))
    .route("/api/v1/auth/logout", post(http::http_logout))
    .route("/api/v1/auth/session", get(http::http_session))
    // Screens
    .route("/api/v1/home", get(http::http_home))
    .route("/api/v1/missions", get(http::http_missions))
    .route("/api/v1/missions/history", get(http::http_history))
    .route("/api/v1/trophies", get(http::http_trophies))
    .route("/api/v1/leaderboard/:period", get(http::http_leaderboard))
    // Mission attempts
    .route("/api/v1/missions/:id/attempts", post(http::http_start_attempt))
    .route("/api/v1/attempts/:id", get(http::http_get_attempt))
    .route("/api/v1/attempts/:id/evidence", post(http::http_post_evidence))
    .route("/api/v1/attempts/:id/answer", post(http::http_post_answer))
    .route("/api/v1/attempts/:id/retry", post(http::http_post_retry))
    // Profile
    .route(
      "/api/v1/profile",
      get(http::http_profile).post(http::http_complete_profile).put(http::http_update_profile),
    )
    .route("/api/v1/profile/username/:name", get(http::http_username))
    .route("/api/v1/profile/picture", post(http::http_profile_picture))
    .route_layer(middleware::from_fn_with_state(state.clone(), http::refresh_session))
    .with_state(state)
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .fallback_service(static_service)
}
