//! # relay-server
//!
//! Axum HTTP + `WebSocket` chat relay.
//!
//! - `WebSocket` gateway on `/ws`: every valid text frame from one client is
//!   forwarded unmodified to all other connected clients
//! - Connection registry with process-unique, monotonically increasing ids
//! - Ping/pong liveness monitor that evicts unresponsive peers
//! - `/health` endpoint and static files from a public directory
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{Result, ServerError};
pub use server::{RelayServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
