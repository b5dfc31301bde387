//! Liveness endpoint.
//!
//! Reports `ok` while the hub accepts upgrades and `full` once it sits at
//! `limits.max_connections`. Both answer 200; a load balancer that wants to
//! steer away from a full hub reads the `status` field.

use crate::config::CleanupPolicy;
use crate::server::SignalHub;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// `ok` or `full`.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Open WebSocket connections, registered or not.
    pub connections: usize,
    /// Client ids currently routed.
    pub clients: usize,
    /// Upgrade ceiling; 0 means unlimited.
    pub max_connections: usize,
    /// What a closing connection removes from the registry.
    pub cleanup_policy: CleanupPolicy,
    /// Seconds since the hub was created.
    pub uptime_seconds: u64,
}

impl HealthStatus {
    /// Snapshot `hub`.
    pub fn of(hub: &SignalHub) -> Self {
        Self {
            status: if hub.at_capacity() { "full" } else { "ok" },
            version: env!("CARGO_PKG_VERSION"),
            connections: hub.active_connections(),
            clients: hub.registered_clients(),
            max_connections: hub.config().limits.max_connections,
            cleanup_policy: hub.config().registry.cleanup_policy,
            uptime_seconds: hub.uptime().as_secs(),
        }
    }
}

/// `GET /health`
pub async fn health_handler(Extension(hub): Extension<Arc<SignalHub>>) -> Json<HealthStatus> {
    Json(HealthStatus::of(&hub))
}
