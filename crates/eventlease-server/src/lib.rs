//! eventlease server library logic.

pub mod api;
pub mod background;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use eventlease_db::DbPool;
use eventlease_types::Clamp;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Clamps applied to lease requests at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseBounds {
    /// Range for `leaseDurationSeconds`.
    pub duration: Clamp,
    /// Range for `limit`.
    pub fetch_limit: Clamp,
}

impl Default for LeaseBounds {
    fn default() -> Self {
        Self {
            duration: Clamp::LEASE_DURATION,
            fetch_limit: Clamp::FETCH_LIMIT,
        }
    }
}

impl From<&config::LeaseConfig> for LeaseBounds {
    fn from(config: &config::LeaseConfig) -> Self {
        Self {
            duration: config.duration_clamp(),
            fetch_limit: config.fetch_limit_clamp(),
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Boundary clamps for lease requests.
    pub leases: LeaseBounds,
}

/// Maximum request body size (1 MiB). Event payloads are the only large input.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/events", post(api::append_event_handler))
        .route("/api/events/lease", post(api::lease_handler))
        .route("/api/events/ack", post(api::ack_handler))
        .route(
            "/api/events/subscriptions/{subscriberId}",
            get(api::get_subscription_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
