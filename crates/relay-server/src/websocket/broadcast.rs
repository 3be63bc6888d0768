//! Frame fan-out to connected WebSocket clients.
//!
//! Delivery is best-effort and at-most-once: a frame is queued once per
//! target, a target whose queue is full or closed simply misses it, and the
//! sender never learns who received what. Frames from different senders may
//! interleave arbitrarily at a target.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tracing::{debug, warn};

use super::connection::ConnectionId;
use super::registry::ConnectionRegistry;

/// Per-frame delivery tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Targets whose queue accepted the frame.
    pub delivered: usize,
    /// Targets that could not take the frame.
    pub dropped: usize,
}

/// Forwards frames from one connection to every other registered connection.
pub struct BroadcastRelay {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRelay {
    /// Create a relay over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this relay fans out over.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Forward `payload` unmodified to every connection except `from`.
    ///
    /// Failures to individual targets are logged and counted; they never stop
    /// delivery to the remaining targets.
    pub fn relay(&self, from: ConnectionId, payload: &Utf8Bytes) -> RelayOutcome {
        let mut outcome = RelayOutcome::default();
        self.registry.for_each_except(from, |conn| {
            if conn.send_text(payload.clone()) {
                outcome.delivered += 1;
            } else {
                outcome.dropped += 1;
                warn!(from = %from, conn_id = %conn.id(), "failed to queue frame for client");
            }
        });
        debug!(
            from = %from,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            bytes = payload.as_str().len(),
            "relayed frame"
        );
        outcome
    }
}
