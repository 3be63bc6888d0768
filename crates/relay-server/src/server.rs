//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{Json, Response};
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::gateway::Gateway;
use crate::websocket::heartbeat::LivenessMonitor;
use crate::websocket::registry::ConnectionRegistry;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session driver for upgraded sockets.
    pub gateway: Arc<Gateway>,
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// When the server started.
    pub start_time: Instant,
    /// Heartbeat interval, reported by `/health`.
    pub heartbeat_interval: Duration,
}

/// The chat relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<Gateway>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server. Nothing is bound until [`listen`](Self::listen).
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = Arc::new(ShutdownCoordinator::new(registry.clone()));
        let gateway = Arc::new(Gateway::new(registry.clone(), &config, shutdown.token()));
        Self {
            config,
            registry,
            gateway,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    ///
    /// `/ws` upgrades to the relay protocol, `/health` reports counters, and
    /// every other path is served from the public directory.
    pub fn router(&self) -> Router {
        let state = AppState {
            gateway: self.gateway.clone(),
            registry: self.registry.clone(),
            start_time: self.start_time,
            heartbeat_interval: self.config.heartbeat_interval(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .fallback_service(ServeDir::new(&self.config.public_dir))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and start serving plus the liveness monitor.
    ///
    /// Both tasks stop when the shutdown token is cancelled.
    pub async fn listen(&self) -> Result<ServerHandle> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let token = self.shutdown.token();
        let router = self.router();
        let server = tokio::spawn(async move {
            let serving = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serving.await {
                error!(error = %e, "server error");
            }
        });

        let monitor = LivenessMonitor::new(self.registry.clone(), self.config.heartbeat_interval());
        let monitor = tokio::spawn(monitor.run(self.shutdown.token()));

        info!(
            addr = %local_addr,
            heartbeat_ms = self.config.heartbeat_interval_ms,
            public_dir = %self.config.public_dir.display(),
            "relay server listening"
        );

        Ok(ServerHandle {
            local_addr,
            server,
            monitor,
        })
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the session gateway.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Handle returned by [`RelayServer::listen`]; owns the background tasks.
pub struct ServerHandle {
    local_addr: SocketAddr,
    server: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Task handles, for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.monitor]
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let gateway = state.gateway;
    ws.on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| gateway.serve(socket))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        &state.registry,
        state.start_time,
        state.heartbeat_interval,
    ))
}
