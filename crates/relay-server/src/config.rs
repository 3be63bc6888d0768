//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_settings::{MalformedFramePolicy, ServerSettings};
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Directory served for non-WebSocket requests.
    pub public_dir: PathBuf,
    /// Handling of frames that are not a valid chat message.
    pub malformed_frames: MalformedFramePolicy,
}

impl ServerConfig {
    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// `host:port` as handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_ms: 10_000,
            send_queue_capacity: 256,
            public_dir: PathBuf::from("public"),
            malformed_frames: MalformedFramePolicy::Drop,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval_ms: settings.heartbeat_interval_ms,
            send_queue_capacity: settings.send_queue_capacity,
            public_dir: PathBuf::from(&settings.public_dir),
            malformed_frames: settings.malformed_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_heartbeat_is_ten_seconds() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(10));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = ServerConfig {
            heartbeat_interval_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(1));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 3001,
            heartbeat_interval_ms: 500,
            send_queue_capacity: 4,
            public_dir: "/srv/chat".into(),
            malformed_frames: MalformedFramePolicy::Close,
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3001");
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(500));
        assert_eq!(cfg.send_queue_capacity, 4);
        assert_eq!(cfg.public_dir, PathBuf::from("/srv/chat"));
        assert_eq!(cfg.malformed_frames, MalformedFramePolicy::Close);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.heartbeat_interval_ms, cfg.heartbeat_interval_ms);
        assert_eq!(back.malformed_frames, cfg.malformed_frames);
    }
}
