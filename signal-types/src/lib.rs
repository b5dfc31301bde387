//! # signal-types
//!
//! Wire format types for the WebRTC signaling hub.
//!
//! Every frame is a UTF-8 JSON object tagged by its `type` field:
//! - [`ClientId`] - caller-chosen peer identity
//! - [`ClientMessage`] - frames a browser peer sends to the hub
//! - [`ServerMessage`] - frames the hub sends back or relays
//! - [`SignalError`] - codec errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;

pub use error::SignalError;
pub use ids::ClientId;
pub use messages::{ClientMessage, ConnectionStatus, ServerMessage};
