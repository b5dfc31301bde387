//! Main SignalHub coordination.
//!
//! SignalHub owns the client registry and routes frames between connections.

use crate::config::{CleanupPolicy, Config};
use crate::limits::RateLimits;
use dashmap::DashMap;
use signal_types::{ClientId, ServerMessage};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Operational metrics for monitoring hub activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Total WebSocket connections accepted.
    pub connections_total: AtomicU64,
    /// Total successful registrations.
    pub registrations_total: AtomicU64,
    /// Total frames forwarded to a registered target.
    pub messages_relayed: AtomicU64,
    /// Total relay attempts whose target was not registered.
    pub targets_missed: AtomicU64,
    /// Total frames rejected as malformed.
    pub malformed_total: AtomicU64,
    /// Total rate limit rejections (connection + message).
    pub rate_limit_hits: AtomicU64,
}

/// Process-unique id of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Sending side of one connection's outbound queue.
///
/// The connection's writer task drains the queue onto the socket in order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    /// Wrap the queue of connection `id`.
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, sender }
    }

    /// The connection this handle writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame, waiting while the queue is full.
    pub async fn send(&self, message: ServerMessage) -> Result<(), ServerMessage> {
        self.sender.send(message).await.map_err(|e| e.0)
    }

    /// True once the connection's writer has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Result of relaying a frame to a named client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Queued on the target's connection.
    Delivered,
    /// No client is registered under that id.
    TargetNotFound,
    /// The id is registered but its connection is already gone.
    TargetClosed,
}

/// Main signaling hub.
pub struct SignalHub {
    config: Config,
    /// Rate limiters for upgrades and frames.
    rate_limits: RateLimits,
    /// Operational metrics (counters).
    metrics: HubMetrics,
    /// Registered clients. Last registration for an id wins.
    registry: DashMap<ClientId, ConnectionHandle>,
    next_connection: AtomicU64,
    active_connections: AtomicUsize,
    started_at: Instant,
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("registered", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl SignalHub {
    /// Create a new SignalHub with the given config.
    pub fn new(config: Config) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            rate_limits,
            metrics: HubMetrics::default(),
            registry: DashMap::new(),
            next_connection: AtomicU64::new(1),
            active_connections: AtomicUsize::new(0),
            started_at: Instant::now(),
        }
    }

    /// Get the hub configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Time since this hub was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True when `limits.max_connections` is set and reached.
    pub fn at_capacity(&self) -> bool {
        let max = self.config.limits.max_connections;
        max > 0 && self.active_connections() >= max
    }

    /// Allocate an id for a newly accepted connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Route `client_id` to `handle`, replacing any earlier registration.
    ///
    /// Returns the handle that was displaced, if any.
    pub fn register(
        &self,
        client_id: ClientId,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let conn = handle.id();
        let replaced = self.registry.insert(client_id.clone(), handle);
        self.metrics.registrations_total.fetch_add(1, Ordering::Relaxed);

        match &replaced {
            Some(old) if old.id() != conn => tracing::info!(
                "Client {} re-registered on {} (replacing {}). Total clients: {}",
                client_id,
                conn,
                old.id(),
                self.registry.len()
            ),
            _ => tracing::info!(
                "Client {} connected on {}. Total clients: {}",
                client_id,
                conn,
                self.registry.len()
            ),
        }
        replaced
    }

    /// Look up the handle registered for `client_id`.
    pub fn lookup(&self, client_id: &ClientId) -> Option<ConnectionHandle> {
        self.registry.get(client_id).map(|entry| entry.value().clone())
    }

    /// Drop the registration of `client_id` on behalf of connection `owner`.
    ///
    /// Under [`CleanupPolicy::ByKey`] the entry is removed whoever holds it;
    /// under [`CleanupPolicy::OwnerOnly`] only while it still points at `owner`.
    /// Returns whether an entry was removed.
    pub fn release(&self, client_id: &ClientId, owner: ConnectionId) -> bool {
        match self.config.registry.cleanup_policy {
            CleanupPolicy::ByKey => {
                let removed = self.registry.remove(client_id);
                self.log_release(client_id, owner, removed)
            }
            CleanupPolicy::OwnerOnly => self.release_owned(client_id, owner),
        }
    }

    /// Drop the registration of `client_id` only while `owner` holds it,
    /// regardless of the configured cleanup policy.
    pub fn release_owned(&self, client_id: &ClientId, owner: ConnectionId) -> bool {
        let removed = self
            .registry
            .remove_if(client_id, |_, handle| handle.id() == owner);
        self.log_release(client_id, owner, removed)
    }

    fn log_release(
        &self,
        client_id: &ClientId,
        owner: ConnectionId,
        removed: Option<(ClientId, ConnectionHandle)>,
    ) -> bool {
        match removed {
            Some((_, handle)) => {
                if handle.id() != owner {
                    tracing::debug!(
                        "Released {} held by {} on behalf of {}",
                        client_id,
                        handle.id(),
                        owner
                    );
                }
                tracing::info!(
                    "Client {} disconnected. Total clients: {}",
                    client_id,
                    self.registry.len()
                );
                true
            }
            None => false,
        }
    }

    /// Queue `message` on the connection registered as `target`.
    ///
    /// The registry entry is cloned out before sending, so no shard lock is
    /// held while waiting on a full queue.
    pub async fn forward(&self, target: &ClientId, message: ServerMessage) -> ForwardOutcome {
        let Some(handle) = self.lookup(target) else {
            self.metrics.targets_missed.fetch_add(1, Ordering::Relaxed);
            return ForwardOutcome::TargetNotFound;
        };

        match handle.send(message).await {
            Ok(()) => {
                self.metrics.messages_relayed.fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::Delivered
            }
            Err(_) => ForwardOutcome::TargetClosed,
        }
    }

    /// Remove entries whose connection has already stopped writing.
    ///
    /// Sessions release their own entries on close; this catches a writer
    /// that died while its session was still blocked elsewhere.
    pub fn prune_closed(&self) -> usize {
        let before = self.registry.len();
        self.registry.retain(|client_id, handle| {
            let open = !handle.is_closed();
            if !open {
                tracing::debug!("Pruning {} ({} closed)", client_id, handle.id());
            }
            open
        });
        before.saturating_sub(self.registry.len())
    }

    /// Whether `client_id` is currently registered.
    pub fn is_registered(&self, client_id: &ClientId) -> bool {
        self.registry.contains_key(client_id)
    }

    /// Number of registered clients.
    pub fn registered_clients(&self) -> usize {
        self.registry.len()
    }

    /// Number of open WebSocket connections, registered or not.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Count a connection as open until the returned guard drops.
    pub fn track_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { hub: self.clone() }
    }
}

/// Keeps the active-connection gauge raised while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    hub: Arc<SignalHub>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
