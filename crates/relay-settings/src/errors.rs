//! Errors raised while building [`RelaySettings`](crate::RelaySettings).

use std::path::PathBuf;

use thiserror::Error;

/// Why the relay settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read relay settings file {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a key has the wrong type.
    #[error("failed to parse relay settings file {}: {source}", path.display())]
    Parse {
        /// File the bad value came from.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// A merged value is outside its allowed range, or a policy name is
    /// unknown.
    #[error("invalid relay setting: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use super::*;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/relay/relay.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read relay settings file /etc/relay/relay.json: denied"
        );
        assert_eq!(err.source().unwrap().to_string(), "denied");
    }

    #[test]
    fn parse_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("relay.json"),
            source,
        };
        let text = err.to_string();
        assert!(text.starts_with("failed to parse relay settings file relay.json: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("heartbeatIntervalMs must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "invalid relay setting: heartbeatIntervalMs must be at least 1"
        );
    }
}
