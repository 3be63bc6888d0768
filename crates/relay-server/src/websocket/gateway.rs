//! WebSocket session handling: one reader and one writer per client.
//!
//! The upgrade itself is done by axum's `WebSocketUpgrade` extractor in
//! [`crate::server`]; this module takes over once the handshake succeeded.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relay_settings::MalformedFramePolicy;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::broadcast::BroadcastRelay;
use super::connection::{Connection, Outbound};
use super::frame::{ChatFrame, FrameError};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;

/// Reason sent with the close frame when a malformed frame is rejected.
const MALFORMED_CLOSE_REASON: &str = "malformed frame";

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// A malformed frame was received under the `close` policy.
    MalformedFrame,
    /// The connection was terminated by the liveness monitor, a write
    /// failure or server shutdown.
    Terminated,
}

/// What an inbound WebSocket message means to the relay.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A well-formed chat frame; carries the original bytes.
    Chat(Utf8Bytes),
    /// A frame that is not part of the protocol.
    Malformed(FrameError),
    /// Answer to a liveness ping.
    Pong,
    /// Peer-initiated close.
    Close,
    /// Nothing to do (pings are answered by the transport).
    Ignore,
}

/// Classify an inbound message.
pub(crate) fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) => match ChatFrame::parse(text.as_str()) {
            Ok(_) => Inbound::Chat(text),
            Err(e) => Inbound::Malformed(e),
        },
        Message::Binary(data) => Inbound::Malformed(FrameError::Binary { len: data.len() }),
        Message::Pong(_) => Inbound::Pong,
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) => Inbound::Ignore,
    }
}

/// Accepts upgraded sockets and runs them until they close.
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    relay: BroadcastRelay,
    malformed_frames: MalformedFramePolicy,
    send_queue_capacity: usize,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Create a gateway. Each connection's termination token is a child of
    /// `shutdown`.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            relay: BroadcastRelay::new(registry.clone()),
            registry,
            malformed_frames: config.malformed_frames,
            send_queue_capacity: config.send_queue_capacity.max(1),
            shutdown,
        }
    }

    /// The relay used to fan out frames.
    pub fn relay(&self) -> &BroadcastRelay {
        &self.relay
    }

    /// Drive one upgraded socket: register it, relay its frames, and clean
    /// up when it closes for any reason.
    #[instrument(skip_all)]
    pub async fn serve(self: Arc<Self>, socket: WebSocket) {
        let (tx, rx) = mpsc::channel(self.send_queue_capacity);
        let conn = self.registry.register(tx, self.shutdown.child_token());
        info!(
            conn_id = %conn.id(),
            connections = self.registry.len(),
            "websocket client connected"
        );

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_loop(conn.clone(), sink, rx));

        let reason = self.read_loop(&conn, stream).await;
        let close_sent = reason == CloseReason::MalformedFrame && self.reject(&conn);
        if !close_sent {
            conn.terminate();
        }
        if let Err(e) = writer.await {
            warn!(conn_id = %conn.id(), error = %e, "writer task failed");
        }

        let _ = conn.begin_close();
        let _ = self.registry.unregister(conn.id());
        conn.mark_closed();
        info!(
            conn_id = %conn.id(),
            reason = ?reason,
            dropped_frames = conn.drop_count(),
            connected_ms = u64::try_from(conn.age().as_millis()).unwrap_or(u64::MAX),
            connections = self.registry.len(),
            "websocket client disconnected"
        );
    }

    /// Stop relaying to `conn` and queue a policy-violation close for it.
    ///
    /// Returns `false` if the close frame could not be queued.
    fn reject(&self, conn: &Connection) -> bool {
        let _ = self.registry.unregister(conn.id());
        conn.close(close_code::POLICY, MALFORMED_CLOSE_REASON)
    }

    async fn read_loop(&self, conn: &Connection, mut stream: SplitStream<WebSocket>) -> CloseReason {
        loop {
            let next = tokio::select! {
                () = conn.terminated() => return CloseReason::Terminated,
                next = stream.next() => next,
            };
            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    debug!(conn_id = %conn.id(), error = %e, "websocket read failed");
                    return CloseReason::ReadError;
                }
                None => return CloseReason::PeerClosed,
            };

            match classify(message) {
                Inbound::Chat(text) => {
                    let _ = self.relay.relay(conn.id(), &text);
                }
                Inbound::Malformed(e) => {
                    warn!(
                        conn_id = %conn.id(),
                        error = %e,
                        policy = %self.malformed_frames,
                        "malformed frame"
                    );
                    if self.malformed_frames == MalformedFramePolicy::Close {
                        return CloseReason::MalformedFrame;
                    }
                }
                Inbound::Pong => {
                    conn.mark_alive();
                    trace!(conn_id = %conn.id(), "pong");
                }
                Inbound::Close => return CloseReason::PeerClosed,
                Inbound::Ignore => {}
            }
        }
    }
}

/// Drain the connection's queue into the socket until the queue closes, a
/// write fails, a close frame goes out, or the connection is terminated.
/// Always leaves the connection terminated so the reader stops too.
async fn write_loop(
    conn: Arc<Connection>,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) {
    loop {
        let item = tokio::select! {
            () = conn.terminated() => break,
            item = rx.recv() => item,
        };
        let Some(item) = item else { break };

        let (message, last) = match item {
            Outbound::Text(text) => (Message::Text(text), false),
            Outbound::Ping => (Message::Ping(Bytes::new()), false),
            Outbound::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code,
                    reason: Utf8Bytes::from_static(reason),
                })),
                true,
            ),
        };

        // A peer that stops reading must not pin this task past termination.
        let sent = tokio::select! {
            () = conn.terminated() => break,
            sent = sink.send(message) => sent,
        };
        if let Err(e) = sent {
            debug!(conn_id = %conn.id(), error = %e, "websocket write failed");
            break;
        }
        if last {
            break;
        }
    }
    conn.terminate();
}
