//! Relay status reported by `GET /health`.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::websocket::registry::ConnectionRegistry;

/// Body of the `/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the server is accepting connections.
    pub status: &'static str,
    /// Whole seconds since the server was created.
    pub uptime_secs: u64,
    /// Connections currently in the registry.
    pub connections: usize,
    /// Frames dropped so far for the connections still registered, because
    /// their outbound queue was full or closed.
    pub dropped_frames: u64,
    /// Heartbeat interval.
    pub heartbeat_interval_ms: u64,
}

/// Snapshot the registry into a health report.
pub fn health_check(
    registry: &ConnectionRegistry,
    start_time: Instant,
    heartbeat_interval: Duration,
) -> HealthResponse {
    let mut dropped_frames = 0u64;
    registry.for_each(|conn| dropped_frames = dropped_frames.saturating_add(conn.drop_count()));

    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections: registry.len(),
        dropped_frames,
        heartbeat_interval_ms: u64::try_from(heartbeat_interval.as_millis()).unwrap_or(u64::MAX),
    }
}
