//! WebSocket endpoint.
//!
//! Upgrades HTTP requests on the configured path and hands each socket to
//! its own [`Session`].

use crate::http::build_router;
use crate::server::SignalHub;
use crate::session::Session;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Upgrade handler for the signaling endpoint.
///
/// Rejects the upgrade with 429 when the peer IP exceeds its connection
/// rate and with 503 when the hub is at `limits.max_connections`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(hub): Extension<Arc<SignalHub>>,
) -> Response {
    if let Err(e) = hub.rate_limits().check_connection(peer.ip()) {
        tracing::warn!("Connection rate limited for {}: {}", peer, e);
        hub.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }

    if hub.at_capacity() {
        tracing::warn!(
            "Connection limit reached ({}/{}), rejecting {}",
            hub.active_connections(),
            hub.config().limits.max_connections,
            peer
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    tracing::debug!("Upgrading connection from {}", peer);
    let max_message_size = hub.config().server.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| async move {
            if let Err(e) = Session::run(hub, socket).await {
                tracing::debug!("Session from {} ended with error: {}", peer, e);
            }
        })
}

/// Serve the hub on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    hub: Arc<SignalHub>,
    listener: TcpListener,
    shutdown: F,
) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    hub.config().validate()?;
    let app = build_router(hub);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
