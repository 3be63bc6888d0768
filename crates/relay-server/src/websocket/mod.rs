//! WebSocket connection management, liveness probing and frame relay.

pub mod broadcast;
pub mod connection;
pub mod frame;
pub mod gateway;
pub mod heartbeat;
pub mod registry;
