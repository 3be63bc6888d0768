//! Settings type definitions.
//!
//! Every struct is `#[serde(default)]` so a settings file may name only the
//! fields it wants to change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 8080, "heartbeatIntervalMs": 5000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener, liveness and frame handling.
    pub server: ServerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.heartbeat_interval_ms == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be greater than zero".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "server.sendQueueCapacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and relay settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Interval between liveness pings in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Per-connection outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Directory served for non-WebSocket requests.
    pub public_dir: String,
    /// What to do with frames that are not a valid chat message.
    pub malformed_frames: MalformedFramePolicy,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            heartbeat_interval_ms: 10_000,
            send_queue_capacity: 256,
            public_dir: "public".to_string(),
            malformed_frames: MalformedFramePolicy::Drop,
        }
    }
}

/// Handling of inbound frames that fail to parse as a chat message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedFramePolicy {
    /// Log and discard the frame; the connection stays open.
    #[default]
    Drop,
    /// Log and close the sending connection.
    Close,
}

impl MalformedFramePolicy {
    /// Lowercase name, as used in settings files and env vars.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for MalformedFramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MalformedFramePolicy {
    type Err = crate::SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "close" => Ok(Self::Close),
            other => Err(crate::SettingsError::InvalidValue(format!(
                "unknown malformed frame policy: {other}"
            ))),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
