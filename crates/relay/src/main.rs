//! # relay
//!
//! WebSocket chat relay binary: loads settings, installs logging and runs the
//! server until Ctrl-C.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::{RelayServer, ServerConfig};
use relay_settings::{MalformedFramePolicy, RelaySettings};
use tracing::info;

/// WebSocket chat relay server.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "WebSocket chat relay server", version)]
struct Cli {
    /// Port to listen on (default 3000).
    port: Option<u16>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Settings file (default `$RELAY_SETTINGS` or `./relay.json`).
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Directory served for non-WebSocket requests.
    #[arg(long, value_name = "DIR")]
    public_dir: Option<PathBuf>,

    /// What to do with malformed frames: `drop` or `close`.
    #[arg(long, value_name = "POLICY")]
    malformed_frames: Option<MalformedFramePolicy>,
}

impl Cli {
    /// Apply flags on top of file and env settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(ref dir) = self.public_dir {
            settings.server.public_dir = dir.display().to_string();
        }
        if let Some(policy) = self.malformed_frames {
            settings.server.malformed_frames = policy;
        }
    }
}

/// File and env settings with the flags applied last. Without `--settings`
/// the file comes from `$RELAY_SETTINGS` or `./relay.json`.
fn load_settings(cli: &Cli) -> Result<RelaySettings> {
    let mut settings = tracing::subscriber::with_default(logging::bootstrap(), || {
        match cli.settings {
            Some(ref path) => relay_settings::load_settings_from_path(path),
            None => relay_settings::load_settings(),
        }
    })
    .context("failed to load settings")?;
    cli.apply(&mut settings);
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init(&settings.logging)?;

    let server = RelayServer::new(ServerConfig::from(&settings.server));
    let handle = server
        .listen()
        .await
        .context("failed to start relay server")?;
    info!(port = handle.port(), "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    server
        .shutdown()
        .graceful_shutdown(handle.into_tasks(), None)
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn no_arguments() {
        let cli = parse(&["relay"]);
        assert!(cli.port.is_none());
        assert!(cli.host.is_none());
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, RelaySettings::default());
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn positional_port() {
        let cli = parse(&["relay", "8080"]);
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["relay", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["relay", "70000"]).is_err());
    }

    #[test]
    fn flags_override_settings() {
        let cli = parse(&[
            "relay",
            "9000",
            "--host",
            "127.0.0.1",
            "--public-dir",
            "/srv/chat",
            "--malformed-frames",
            "close",
        ]);
        let mut settings = RelaySettings::default();
        settings.server.port = 4000;
        settings.server.host = "10.0.0.1".into();
        cli.apply(&mut settings);

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.public_dir, "/srv/chat");
        assert_eq!(settings.server.malformed_frames, MalformedFramePolicy::Close);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["relay", "--malformed-frames", "explode"]).is_err());
    }

    #[test]
    fn cli_wins_over_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(
            &path,
            r#"{"server":{"port":4000,"heartbeatIntervalMs":2500}}"#,
        )
        .unwrap();

        let path_arg = path.display().to_string();
        let cli = parse(&["relay", "5000", "--settings", &path_arg]);
        let settings = load_settings(&cli).unwrap();

        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.heartbeat_interval_ms, 2500);
    }

    #[test]
    fn invalid_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, "{ not json").unwrap();

        let path_arg = path.display().to_string();
        let cli = parse(&["relay", "--settings", &path_arg]);
        let err = load_settings(&cli).unwrap_err();
        assert_eq!(err.to_string(), "failed to load settings");
        let chain = format!("{err:#}");
        assert!(chain.contains(&path_arg), "{chain}");
        assert!(chain.contains("failed to parse relay settings file"));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
