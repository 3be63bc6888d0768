//! Heartbeat ping/pong liveness monitoring.
//!
//! One task pings every registered connection per interval. A connection
//! that has not answered the previous ping by the next tick is terminated
//! and unregistered, so a dead peer is evicted between one and two
//! intervals after its last pong.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::connection::ConnectionId;
use super::registry::ConnectionRegistry;

/// What a single tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Connections that were alive and got a fresh ping.
    pub pinged: usize,
    /// Connections terminated for missing the previous ping.
    pub evicted: Vec<ConnectionId>,
}

/// Periodic liveness checker over a [`ConnectionRegistry`].
pub struct LivenessMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl LivenessMonitor {
    /// Create a monitor that ticks every `interval`.
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run one ping round.
    ///
    /// For each connection the alive flag is cleared in a single atomic swap:
    /// if it was already clear the connection is terminated and removed,
    /// otherwise a ping is queued.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        self.registry.for_each(|conn| {
            if conn.check_alive() {
                report.pinged += 1;
                if !conn.ping() {
                    debug!(conn_id = %conn.id(), "failed to queue ping");
                }
            } else {
                conn.terminate();
                report.evicted.push(conn.id());
            }
        });

        for id in &report.evicted {
            if self.registry.unregister(*id) {
                info!(conn_id = %id, "evicted unresponsive connection");
            }
        }
        report
    }

    /// Tick until `cancel` fires. The first tick happens one interval after
    /// the call.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick();
                    trace!(
                        pinged = report.pinged,
                        evicted = report.evicted.len(),
                        "liveness tick"
                    );
                }
                () = cancel.cancelled() => {
                    debug!("liveness monitor stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::{Connection, Outbound};
    use tokio::sync::mpsc;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn setup() -> (Arc<ConnectionRegistry>, LivenessMonitor) {
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LivenessMonitor::new(registry.clone(), INTERVAL);
        (registry, monitor)
    }

    fn connect(registry: &ConnectionRegistry) -> (Arc<Connection>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(tx, CancellationToken::new()), rx)
    }

    #[test]
    fn first_tick_clears_flag_and_pings() {
        let (registry, monitor) = setup();
        let (d, mut rd) = connect(&registry);

        let report = monitor.tick();

        assert_eq!(report.pinged, 1);
        assert!(report.evicted.is_empty());
        assert!(!d.is_alive());
        assert!(registry.contains(d.id()));
        assert!(matches!(rd.try_recv(), Ok(Outbound::Ping)));
    }

    #[test]
    fn second_tick_without_pong_evicts() {
        let (registry, monitor) = setup();
        let (d, _rd) = connect(&registry);

        let _ = monitor.tick();
        let report = monitor.tick();

        assert_eq!(report.evicted, vec![d.id()]);
        assert_eq!(report.pinged, 0);
        assert!(registry.is_empty());
        assert!(d.is_terminated());
    }

    #[test]
    fn pong_between_ticks_keeps_connection() {
        let (registry, monitor) = setup();
        let (d, _rd) = connect(&registry);

        for _ in 0..20 {
            let report = monitor.tick();
            assert!(report.evicted.is_empty());
            d.mark_alive();
        }
        assert!(registry.contains(d.id()));
        assert!(!d.is_terminated());
    }

    #[test]
    fn only_silent_connections_are_evicted() {
        let (registry, monitor) = setup();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);

        let _ = monitor.tick();
        a.mark_alive();
        let report = monitor.tick();

        assert_eq!(report.pinged, 1);
        assert_eq!(report.evicted, vec![b.id()]);
        assert_eq!(registry.ids(), vec![a.id()]);
    }

    #[test]
    fn eviction_after_concurrent_close_is_harmless() {
        let (registry, monitor) = setup();
        let (d, _rd) = connect(&registry);
        let _ = monitor.tick();
        // The connection's own close path ran first.
        assert!(registry.unregister(d.id()));
        let report = monitor.tick();
        assert!(report.evicted.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn full_queue_still_counts_as_pinged() {
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LivenessMonitor::new(registry.clone(), INTERVAL);
        let (tx, _rx) = mpsc::channel(1);
        let conn = registry.register(tx, CancellationToken::new());
        assert!(conn.ping());

        let report = monitor.tick();
        assert_eq!(report.pinged, 1);
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_evicted_on_second_interval() {
        let (registry, monitor) = setup();
        let (d, mut rd) = connect(&registry);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));

        // Nothing happens before the first interval elapses.
        time::sleep(INTERVAL / 2).await;
        assert!(d.is_alive());
        assert!(rd.try_recv().is_err());

        time::sleep(INTERVAL / 2 + Duration::from_millis(1)).await;
        assert!(!d.is_alive());
        assert!(registry.contains(d.id()));
        assert!(matches!(rd.try_recv(), Ok(Outbound::Ping)));

        time::sleep(INTERVAL).await;
        assert!(!registry.contains(d.id()));
        assert!(d.is_terminated());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn responsive_connection_survives_many_intervals() {
        let (registry, monitor) = setup();
        let (d, mut rd) = connect(&registry);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));

        // Answer every ping like a well-behaved client.
        let peer = d.clone();
        let responder = tokio::spawn(async move {
            while let Some(item) = rd.recv().await {
                if item == Outbound::Ping {
                    peer.mark_alive();
                }
            }
        });

        time::sleep(INTERVAL * 25).await;
        assert!(registry.contains(d.id()));
        assert!(!d.is_terminated());

        cancel.cancel();
        handle.await.unwrap();
        responder.abort();
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (_registry, monitor) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();
        monitor.run(cancel).await;
    }
}
