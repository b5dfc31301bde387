//! Rate limiting for signal-hub.
//!
//! Provides optional protection against connection flooding and message spam.
//!
//! ## Design Notes
//!
//! Browsers pick their own client ids, so ids cannot be trusted as limiter
//! keys. Instead, we rate limit by:
//! - **peer IP** for WebSocket upgrades
//! - **connection id** for inbound frames
//!
//! Both use the governor crate's keyed rate limiters backed by DashMap.
//! A configured rate of 0 leaves the limiter out entirely.

use crate::config::LimitsConfig;
use crate::server::ConnectionId;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::hash::Hash;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Rate limiters for the hub.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits WebSocket upgrades per peer IP.
    ///
    /// Configured via `limits.connections_per_ip_per_minute`.
    connection_limiter: Option<Arc<KeyedLimiter<IpAddr>>>,

    /// Limits inbound frames per connection.
    ///
    /// Configured via `limits.messages_per_minute`.
    message_limiter: Option<Arc<KeyedLimiter<ConnectionId>>>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("connection_limiter", &self.connection_limiter.is_some())
            .field("message_limiter", &self.message_limiter.is_some())
            .finish()
    }
}

fn keyed_per_minute<K: Hash + Eq + Clone>(per_minute: u32) -> Option<Arc<KeyedLimiter<K>>> {
    NonZeroU32::new(per_minute).map(|n| Arc::new(RateLimiter::keyed(Quota::per_minute(n))))
}

impl RateLimits {
    /// Create rate limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            connection_limiter: keyed_per_minute(config.connections_per_ip_per_minute),
            message_limiter: keyed_per_minute(config.messages_per_minute),
        }
    }

    /// Check if an upgrade from `ip` is allowed.
    pub fn check_connection(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        match &self.connection_limiter {
            Some(limiter) => limiter
                .check_key(&ip)
                .map_err(|_| RateLimitError::ConnectionLimitExceeded),
            None => Ok(()),
        }
    }

    /// Check if another inbound frame on `connection` is allowed.
    pub fn check_message(&self, connection: ConnectionId) -> Result<(), RateLimitError> {
        match &self.message_limiter {
            Some(limiter) => limiter
                .check_key(&connection)
                .map_err(|_| RateLimitError::MessageLimitExceeded),
            None => Ok(()),
        }
    }

    /// Get the number of tracked connection keys (for metrics).
    pub fn connection_keys_count(&self) -> usize {
        self.connection_limiter.as_ref().map_or(0, |l| l.len())
    }

    /// Get the number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.as_ref().map_or(0, |l| l.len())
    }

    /// Evict idle entries from the keyed limiter maps.
    ///
    /// Closed connections and departed IPs otherwise stay in the maps
    /// forever. Called periodically from the maintenance task.
    pub fn shrink(&self) {
        if let Some(limiter) = &self.connection_limiter {
            limiter.retain_recent();
        }
        if let Some(limiter) = &self.message_limiter {
            limiter.retain_recent();
        }
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many upgrades from this IP.
    #[error("connection rate limit exceeded")]
    ConnectionLimitExceeded,
    /// Too many frames on this connection.
    #[error("message rate limit exceeded")]
    MessageLimitExceeded,
}
