//! Error types for the signaling wire format.

use thiserror::Error;

/// Errors raised while encoding or decoding signaling frames.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Frame is not JSON, is missing `type`, or lacks a required field
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),

    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}
