//! # signal-hub
//!
//! WebSocket rendezvous hub for WebRTC signaling.
//!
//! This crate implements a hub that:
//! - Accepts WebSocket connections from browser peers
//! - Registers each peer under a caller-chosen client id
//! - Relays offers, answers and ICE candidates to a named peer
//! - Forgets a peer as soon as its socket closes (no persistence)
//!
//! ## Architecture
//!
//! ```text
//! Peer A ──┐   JSON over /ws    ┌── Peer B
//!          │                    │
//!      ┌───┴────────────────────┴───┐
//!      │         signal-hub         │
//!      │  ┌──────────────────────┐  │
//!      │  │ registry: id → queue │  │
//!      │  └──────────────────────┘  │
//!      └────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! - `connection` → `connection {status: connected}` (register)
//! - `offer` → relayed with `from`; `error` to the sender if the target is unknown
//! - `answer`, `ice-candidate` → relayed with `from`; dropped silently if unknown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod limits;
pub mod protocol;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{HubError, ProtocolError, Result};
pub use server::SignalHub;
