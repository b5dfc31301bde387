//! HTTP endpoints for signal-hub.
//!
//! Mounts the WebSocket endpoint next to health and metrics endpoints.

pub mod health;
mod metrics;

use crate::protocol::ws_handler;
use crate::server::SignalHub;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the router with all endpoints.
pub fn build_router(hub: Arc<SignalHub>) -> Router {
    let mut router = Router::new()
        .route(&hub.config().server.ws_path, get(ws_handler))
        .route("/health", get(health::health_handler));

    if hub.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(hub))
}
