//! WebSocket client connection state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Process-unique connection identifier, assigned at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item queued for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame, forwarded byte-for-byte.
    Text(Utf8Bytes),
    /// A liveness ping.
    Ping,
    /// A close frame; the writer stops after sending it.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Human-readable reason.
        reason: &'static str,
    },
}

/// Lifecycle of a connection.
///
/// `Connecting → Open → Closing → Closed`; transitions never go backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Handshake complete, not yet registered.
    Connecting,
    /// Registered and relaying.
    Open,
    /// Close initiated by the peer, an I/O error, policy or termination.
    Closing,
    /// Tasks finished and removed from the registry.
    Closed,
}

/// Represents a connected WebSocket client.
pub struct Connection {
    id: ConnectionId,
    /// Whether the client has answered the last ping.
    alive: AtomicBool,
    state: Mutex<ConnectionState>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Outbound>,
    /// Cancelled to drop the transport without a close handshake.
    terminate: CancellationToken,
    connected_at: Instant,
    /// Count of frames dropped because the queue was full or closed.
    dropped_frames: AtomicU64,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        tx: mpsc::Sender<Outbound>,
        terminate: CancellationToken,
    ) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            state: Mutex::new(ConnectionState::Connecting),
            tx,
            terminate,
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Queue a text frame for the client.
    ///
    /// Never blocks. Returns `false` if the queue is full or the writer has
    /// gone away, and increments the dropped frame counter.
    pub fn send_text(&self, payload: Utf8Bytes) -> bool {
        self.enqueue(Outbound::Text(payload))
    }

    /// Queue a ping for the client.
    pub fn ping(&self) -> bool {
        self.enqueue(Outbound::Ping)
    }

    /// Queue a close frame. Returns `false` if it could not be queued, in
    /// which case the caller should [`terminate`](Self::terminate) instead.
    pub fn close(&self, code: u16, reason: &'static str) -> bool {
        let _ = self.begin_close();
        self.tx.try_send(Outbound::Close { code, reason }).is_ok()
    }

    fn enqueue(&self, item: Outbound) -> bool {
        if self.tx.try_send(item).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Read the alive flag without changing it.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Check and reset the alive flag in one step.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Forcibly close the transport.
    pub fn terminate(&self) {
        let _ = self.begin_close();
        self.terminate.cancel();
    }

    /// Whether [`terminate`](Self::terminate) has been called (or the server
    /// is shutting down).
    pub fn is_terminated(&self) -> bool {
        self.terminate.is_cancelled()
    }

    /// Resolves once the connection is terminated.
    pub fn terminated(&self) -> WaitForCancellationFuture<'_> {
        self.terminate.cancelled()
    }

    /// `Connecting → Open`. Returns `false` if the connection already moved on.
    pub(crate) fn open(&self) -> bool {
        self.advance(ConnectionState::Open)
    }

    /// Move to `Closing`. Returns `true` only for the caller that made the
    /// transition.
    pub fn begin_close(&self) -> bool {
        self.advance(ConnectionState::Closing)
    }

    /// Move to `Closed`.
    pub(crate) fn mark_closed(&self) {
        let _ = self.advance(ConnectionState::Closed);
    }

    fn advance(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("state", &self.state())
            .field("dropped_frames", &self.drop_count())
            .finish_non_exhaustive()
    }
}
