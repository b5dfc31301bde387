//! Signaling frames exchanged with the hub.
//!
//! Session descriptions and ICE candidates are carried as opaque
//! [`serde_json::Value`]s. The hub never looks inside them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ClientId, SignalError};

/// Frames a peer sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Claim a client id for this connection
    Connection {
        /// Requested identity; absent and empty are both rejected by the hub
        #[serde(rename = "clientId", default)]
        client_id: Option<ClientId>,
    },
    /// Session-description offer for `target`
    Offer {
        /// Recipient id
        #[serde(default)]
        target: Option<ClientId>,
        /// Opaque SDP payload
        offer: Value,
    },
    /// Session-description answer for `target`
    Answer {
        /// Recipient id
        #[serde(default)]
        target: Option<ClientId>,
        /// Opaque SDP payload
        answer: Value,
    },
    /// ICE candidate for `target`
    IceCandidate {
        /// Recipient id
        #[serde(default)]
        target: Option<ClientId>,
        /// Opaque candidate payload
        candidate: Value,
    },
    /// Any other `type`; accepted on the wire and ignored
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    ///
    /// Fails when the frame is not JSON, has no string `type`, or a known
    /// type is missing its payload field.
    pub fn from_json(text: &str) -> Result<Self, SignalError> {
        serde_json::from_str(text).map_err(SignalError::Decode)
    }

    /// Wire name of this frame's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Unknown => "unknown",
        }
    }
}

/// Registration status reported in the `connection` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// The id is now routed to this connection
    Connected,
}

/// Frames the hub sends to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Registration acknowledgement
    Connection {
        /// Always `connected`
        status: ConnectionStatus,
        /// The id that was registered
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    /// Relayed offer
    Offer {
        /// Payload exactly as the sender supplied it
        offer: Value,
        /// Sender id, `null` if the sender never registered
        from: Option<ClientId>,
    },
    /// Relayed answer
    Answer {
        /// Payload exactly as the sender supplied it
        answer: Value,
        /// Sender id, `null` if the sender never registered
        from: Option<ClientId>,
    },
    /// Relayed ICE candidate
    IceCandidate {
        /// Payload exactly as the sender supplied it
        candidate: Value,
        /// Sender id, `null` if the sender never registered
        from: Option<ClientId>,
    },
    /// Error report addressed to the sender only
    Error {
        /// Human-readable description
        message: String,
    },
}

impl ServerMessage {
    /// Acknowledge a successful registration.
    pub fn connected(client_id: ClientId) -> Self {
        Self::Connection {
            status: ConnectionStatus::Connected,
            client_id,
        }
    }

    /// Error frame with a free-form message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Reply to a `connection` frame without a usable id.
    pub fn client_id_required() -> Self {
        Self::error("Client ID is required")
    }

    /// Reply to an `offer` whose target is not registered.
    pub fn target_not_found(target: Option<&ClientId>) -> Self {
        let target = target.map(ClientId::as_str).unwrap_or_default();
        Self::error(format!("Target client {target} not found"))
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(SignalError::Encode)
    }
}
