//! Background maintenance task.
//!
//! Runs periodically to evict idle rate-limiter keys and prune registry
//! entries whose connection is gone.

use crate::config::CleanupConfig;
use crate::server::SignalHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background maintenance task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    hub: Arc<SignalHub>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs;
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            run_once(&hub);
        }
    })
}

/// One maintenance pass.
pub fn run_once(hub: &SignalHub) -> usize {
    hub.rate_limits().shrink();

    let pruned = hub.prune_closed();
    if pruned > 0 {
        tracing::info!("Cleanup: pruned {} dead registrations", pruned);
    } else {
        tracing::debug!(
            "Cleanup: {} clients on {} connections",
            hub.registered_clients(),
            hub.active_connections()
        );
    }
    pruned
}
