//! Per-connection session management.
//!
//! Each WebSocket gets a Session that tracks its identity, handles inbound
//! frames and releases its registration when the socket goes away.

use crate::error::{ProtocolError, ProtocolResult};
use crate::server::{ConnectionHandle, ConnectionId, ForwardOutcome, SignalHub};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use signal_types::{ClientId, ClientMessage, ServerMessage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How long a closing session waits for its queued frames to reach the socket.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Session state machine states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No `connection` frame accepted yet.
    Unregistered,
    /// Routed under `client_id`.
    Registered {
        /// The id this connection registered.
        client_id: ClientId,
    },
    /// Cleanup has run; the session handles nothing more.
    Closed,
}

/// What the receive loop does after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Stop reading and clean up.
    Close,
}

/// A per-connection session.
pub struct Session {
    hub: Arc<SignalHub>,
    handle: ConnectionHandle,
    state: SessionState,
}

impl Session {
    /// Create a session that replies through `handle`.
    pub fn new(hub: Arc<SignalHub>, handle: ConnectionHandle) -> Self {
        Self {
            hub,
            handle,
            state: SessionState::Unregistered,
        }
    }

    /// Serve one upgraded WebSocket until it closes.
    ///
    /// Spawns the writer task that owns the socket's sending half, runs the
    /// receive loop, cleans up, then lets the writer flush what is queued.
    pub async fn run(hub: Arc<SignalHub>, socket: WebSocket) -> ProtocolResult<()> {
        let _guard = hub.track_connection();
        let conn = hub.next_connection_id();
        tracing::info!("New connection {}", conn);

        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(hub.config().server.outbound_buffer);
        let writer = tokio::spawn(write_loop(sink, rx, conn));

        let session = Session::new(hub, ConnectionHandle::new(conn, tx));
        let result = session.drive(stream).await;

        // Every sender is gone once cleanup has released the registry entry,
        // so the writer ends after draining its queue.
        match tokio::time::timeout(FLUSH_TIMEOUT, writer).await {
            Ok(_) => {}
            Err(_) => tracing::debug!("Writer for {} did not flush in time", conn),
        }
        tracing::info!("Connection {} closed", conn);
        result
    }

    /// Run the receive loop over `stream`, then clean up exactly once.
    pub async fn drive<S>(mut self, stream: S) -> ProtocolResult<()>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let result = self.receive_loop(stream).await;
        if let Err(e) = &result {
            tracing::warn!(
                "Session {} ({}) ended: {}",
                self.handle.id(),
                self.describe(),
                e
            );
        }
        self.cleanup();
        result
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The registered identity, if any.
    pub fn client_id(&self) -> Option<&ClientId> {
        match &self.state {
            SessionState::Registered { client_id } => Some(client_id),
            _ => None,
        }
    }

    /// The connection this session serves.
    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    async fn receive_loop<S>(&mut self, mut stream: S) -> ProtocolResult<()>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let timeout_secs = self.hub.config().limits.registration_timeout_secs;
        let deadline =
            (timeout_secs > 0).then(|| Instant::now() + Duration::from_secs(timeout_secs));

        loop {
            let next = match deadline {
                Some(deadline) if self.state == SessionState::Unregistered => {
                    match tokio::time::timeout_at(deadline, stream.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            return Err(ProtocolError::RegistrationTimeout {
                                secs: timeout_secs,
                            });
                        }
                    }
                }
                _ => stream.next().await,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(ProtocolError::Transport(e.to_string())),
                None => return Ok(()),
            };

            match frame {
                Message::Text(text) => {
                    if self.handle_text(&text).await? == Flow::Close {
                        return Ok(());
                    }
                }
                Message::Close(_) => return Ok(()),
                // Binary frames carry nothing we route; pings are answered by axum.
                _ => {}
            }
        }
    }

    /// Handle one text frame.
    ///
    /// Malformed frames are errors and end the session; everything the
    /// peer should hear about is queued as an `error` frame instead.
    pub async fn handle_text(&mut self, text: &str) -> ProtocolResult<Flow> {
        if let Err(e) = self.hub.rate_limits().check_message(self.handle.id()) {
            tracing::warn!("Frame from {} dropped: {}", self.describe(), e);
            self.hub
                .metrics()
                .rate_limit_hits
                .fetch_add(1, Ordering::Relaxed);
            self.reply(ServerMessage::error(e.to_string())).await?;
            return Ok(Flow::Continue);
        }

        let message = ClientMessage::from_json(text).inspect_err(|_| {
            self.hub
                .metrics()
                .malformed_total
                .fetch_add(1, Ordering::Relaxed);
        })?;
        tracing::trace!("{} frame from {}", message.kind(), self.describe());

        match message {
            ClientMessage::Connection { client_id } => self.handle_connection(client_id).await,
            ClientMessage::Offer { target, offer } => {
                let from = self.client_id().cloned();
                tracing::debug!("Received offer from {} to {:?}", self.describe(), target);
                let outcome = self
                    .relay(target.as_ref(), ServerMessage::Offer { offer, from })
                    .await;
                if outcome == ForwardOutcome::TargetNotFound {
                    self.reply(ServerMessage::target_not_found(target.as_ref()))
                        .await?;
                }
                Ok(Flow::Continue)
            }
            ClientMessage::Answer { target, answer } => {
                let from = self.client_id().cloned();
                tracing::debug!("Received answer from {} to {:?}", self.describe(), target);
                // A missed answer is not reported back to the sender.
                self.relay(target.as_ref(), ServerMessage::Answer { answer, from })
                    .await;
                Ok(Flow::Continue)
            }
            ClientMessage::IceCandidate { target, candidate } => {
                let from = self.client_id().cloned();
                tracing::debug!(
                    "Received ICE candidate from {} to {:?}",
                    self.describe(),
                    target
                );
                self.relay(
                    target.as_ref(),
                    ServerMessage::IceCandidate { candidate, from },
                )
                .await;
                Ok(Flow::Continue)
            }
            ClientMessage::Unknown => {
                tracing::debug!("Ignoring unknown frame type from {}", self.describe());
                Ok(Flow::Continue)
            }
        }
    }

    async fn handle_connection(&mut self, client_id: Option<ClientId>) -> ProtocolResult<Flow> {
        let Some(client_id) = client_id.filter(|id| !id.is_empty()) else {
            tracing::warn!("Connection {} sent no client id", self.handle.id());
            self.reply(ServerMessage::client_id_required()).await?;
            return Ok(Flow::Close);
        };

        tracing::info!("Received connection from client {}", client_id);

        // Switching ids drops the old id only if this socket still owns it.
        if let SessionState::Registered { client_id: previous } = &self.state {
            if *previous != client_id {
                self.hub.release_owned(previous, self.handle.id());
            }
        }

        self.hub.register(client_id.clone(), self.handle.clone());
        self.state = SessionState::Registered {
            client_id: client_id.clone(),
        };

        self.reply(ServerMessage::connected(client_id)).await?;
        Ok(Flow::Continue)
    }

    /// Forward to `target`. Absent or empty targets are never registered.
    async fn relay(&self, target: Option<&ClientId>, message: ServerMessage) -> ForwardOutcome {
        let outcome = match target.filter(|t| !t.is_empty()) {
            Some(target) => self.hub.forward(target, message).await,
            None => {
                self.hub
                    .metrics()
                    .targets_missed
                    .fetch_add(1, Ordering::Relaxed);
                ForwardOutcome::TargetNotFound
            }
        };

        match outcome {
            ForwardOutcome::Delivered => {}
            ForwardOutcome::TargetNotFound => {
                tracing::debug!("Target {:?} not registered", target)
            }
            ForwardOutcome::TargetClosed => {
                tracing::debug!("Target {:?} already disconnected, frame dropped", target)
            }
        }
        outcome
    }

    async fn reply(&self, message: ServerMessage) -> ProtocolResult<()> {
        self.handle
            .send(message)
            .await
            .map_err(|_| ProtocolError::OutboundClosed)
    }

    fn cleanup(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Registered { client_id } = previous {
            tracing::info!("Connection closed for client {}", client_id);
            self.hub.release(&client_id, self.handle.id());
        }
    }

    fn describe(&self) -> String {
        match &self.state {
            SessionState::Registered { client_id } => format!("client {}", client_id),
            _ => format!("unregistered {}", self.handle.id()),
        }
    }
}

/// Drain `rx` onto the socket in order, then close it.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerMessage>,
    conn: ConnectionId,
) {
    while let Some(message) = rx.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode frame for {}: {}", conn, e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::debug!("Send to {} failed: {}", conn, e);
            break;
        }
    }
    let _ = sink.close().await;
}
