//! Error types for signal-hub.

/// Main error type for signal-hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-connection protocol errors. Each one ends the affected session only.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not JSON or lacks a `type` or payload field.
    #[error("malformed message: {0}")]
    Malformed(#[from] signal_types::SignalError),

    /// The socket failed while reading.
    #[error("transport error: {0}")]
    Transport(String),

    /// This connection's writer has stopped, so nothing more can reach the peer.
    #[error("outbound channel closed")]
    OutboundClosed,

    /// No `connection` frame arrived in time.
    #[error("registration timed out after {secs}s")]
    RegistrationTimeout {
        /// Configured timeout.
        secs: u64,
    },
}

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
