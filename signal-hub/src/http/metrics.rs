//! Prometheus metrics endpoint.

use crate::server::SignalHub;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(hub): Extension<Arc<SignalHub>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&hub),
    )
}

fn render(hub: &SignalHub) -> String {
    let m = hub.metrics();

    // Gauges: current state
    let connections = hub.active_connections();
    let clients = hub.registered_clients();
    let ip_keys = hub.rate_limits().connection_keys_count();
    let connection_keys = hub.rate_limits().message_keys_count();

    // Counters: monotonic since startup
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let registrations = m.registrations_total.load(Ordering::Relaxed);
    let relayed = m.messages_relayed.load(Ordering::Relaxed);
    let missed = m.targets_missed.load(Ordering::Relaxed);
    let malformed = m.malformed_total.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);

    format!(
        r#"# HELP signal_hub_connections_active Number of open WebSocket connections
# TYPE signal_hub_connections_active gauge
signal_hub_connections_active {connections}

# HELP signal_hub_clients_registered Number of registered client ids
# TYPE signal_hub_clients_registered gauge
signal_hub_clients_registered {clients}

# HELP signal_hub_rate_limit_ip_keys Peer IPs tracked by the connection rate limiter
# TYPE signal_hub_rate_limit_ip_keys gauge
signal_hub_rate_limit_ip_keys {ip_keys}

# HELP signal_hub_rate_limit_connection_keys Connections tracked by the message rate limiter
# TYPE signal_hub_rate_limit_connection_keys gauge
signal_hub_rate_limit_connection_keys {connection_keys}

# HELP signal_hub_info Server information
# TYPE signal_hub_info gauge
signal_hub_info{{version="{version}"}} 1

# HELP signal_hub_connections_total Total WebSocket connections accepted
# TYPE signal_hub_connections_total counter
signal_hub_connections_total {conns_total}

# HELP signal_hub_registrations_total Total client registrations
# TYPE signal_hub_registrations_total counter
signal_hub_registrations_total {registrations}

# HELP signal_hub_messages_relayed_total Total frames forwarded to a target
# TYPE signal_hub_messages_relayed_total counter
signal_hub_messages_relayed_total {relayed}

# HELP signal_hub_targets_missed_total Total relay attempts to unregistered targets
# TYPE signal_hub_targets_missed_total counter
signal_hub_targets_missed_total {missed}

# HELP signal_hub_malformed_total Total malformed frames
# TYPE signal_hub_malformed_total counter
signal_hub_malformed_total {malformed}

# HELP signal_hub_rate_limit_hits_total Total rate limit rejections
# TYPE signal_hub_rate_limit_hits_total counter
signal_hub_rate_limit_hits_total {rate_limits}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn render_includes_counters() {
        let hub = SignalHub::new(Config::default());
        hub.metrics().messages_relayed.fetch_add(7, Ordering::Relaxed);

        let body = render(&hub);
        assert!(body.contains("# TYPE signal_hub_clients_registered gauge"));
        assert!(body.contains("signal_hub_messages_relayed_total 7"));
        assert!(body.contains("signal_hub_connections_active 0"));
        assert!(body.contains("signal_hub_rate_limit_ip_keys 0"));
    }

    #[test]
    fn render_reports_limiter_keys() {
        let mut config = Config::default();
        config.limits.connections_per_ip_per_minute = 10;
        config.limits.messages_per_minute = 10;
        let hub = SignalHub::new(config);

        hub.rate_limits()
            .check_connection(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        for conn in [hub.next_connection_id(), hub.next_connection_id()] {
            hub.rate_limits().check_message(conn).unwrap();
        }

        let body = render(&hub);
        assert!(body.contains("signal_hub_rate_limit_ip_keys 1"));
        assert!(body.contains("signal_hub_rate_limit_connection_keys 2"));
    }
}
