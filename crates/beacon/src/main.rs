//! # beacon
//!
//! Beacon presence server binary: loads settings, starts the WebSocket
//! server and the broadcast loop, and runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_server::{BeaconServer, ClaimedEntitlement, PresenceService, SHUTDOWN_GRACE};
use beacon_settings::{BeaconSettings, SettingsError};
use clap::Parser;

/// Beacon presence server.
#[derive(Parser, Debug)]
#[command(name = "beacon", about = "Presence and visibility broadcast server")]
struct Cli {
    /// Settings file (defaults to `~/.beacon/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut BeaconSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }

    /// Settings file, env overrides, then command-line flags.
    ///
    /// Problems are returned for logging; whatever could not be used falls
    /// back to its default without discarding the rest.
    fn resolve_settings(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> (PathBuf, BeaconSettings, Vec<SettingsError>) {
        let path = self.settings.clone().unwrap_or_else(beacon_settings::settings_path);
        let (mut settings, problems) = beacon_settings::load_settings_with(&path, lookup);
        self.apply(&mut settings);
        (path, settings, problems)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Load settings before logging so the configured level applies.
    let (settings_path, settings, problems) = args.resolve_settings(|name| std::env::var(name).ok());

    beacon_logging::init_subscriber(&settings.logging.level, settings.logging.json);
    for problem in &problems {
        tracing::warn!(
            path = %settings_path.display(),
            field = problem.field().unwrap_or("-"),
            error = %problem,
            "ignoring unusable setting"
        );
    }

    let metrics = beacon_server::metrics::install_recorder().context("Failed to install metrics")?;

    let (server_config, presence_config) = beacon_server::config::from_settings(&settings);
    let service = Arc::new(PresenceService::new(presence_config, Arc::new(ClaimedEntitlement)));
    let server = BeaconServer::new(server_config, service, metrics);

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;
    let broadcaster = server.spawn_broadcaster();

    tracing::info!("Beacon listening on http://{addr} (ws path {})", server.config().ws_path);

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let _ = server.drain(vec![handle, broadcaster], SHUTDOWN_GRACE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["beacon"]);
        assert!(cli.settings.is_none());
        let mut settings = BeaconSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, BeaconSettings::default());
    }

    #[test]
    fn cli_overrides_host_and_port() {
        let cli = Cli::parse_from(["beacon", "--host", "127.0.0.1", "--port", "9000"]);
        let mut settings = BeaconSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn cli_settings_path() {
        let cli = Cli::parse_from(["beacon", "--settings", "/tmp/beacon.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/beacon.json")));
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["beacon", "--port", "70000"]).is_err());
    }

    #[test]
    fn bad_settings_file_keeps_env_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"wsPath": "ws"}, "presence": {"presenceTtlMs": 5000}}"#,
        )
        .unwrap();
        let cli = Cli::parse_from(["beacon", "--settings", path.to_str().unwrap(), "--port", "9100"]);

        let (_, settings, problems) = cli.resolve_settings(|name| {
            (name == "BEACON_BROADCAST_INTERVAL_MS").then(|| "400".to_string())
        });
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].field(), Some("server.wsPath"));

        let (server, presence) = beacon_server::config::from_settings(&settings);
        assert_eq!(server.ws_path, "/ws");
        assert_eq!(server.port, 9100);
        assert_eq!(presence.presence_ttl, std::time::Duration::from_millis(5_000));
        assert_eq!(presence.broadcast_interval, std::time::Duration::from_millis(400));
    }

    #[test]
    fn settings_file_feeds_server_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"wsPath": "/presence"}, "presence": {"presenceTtlMs": 5000}}"#)
            .unwrap();

        let settings = beacon_settings::load_settings_from_path(&path).unwrap();
        let (server, presence) = beacon_server::config::from_settings(&settings);
        assert_eq!(server.ws_path, "/presence");
        assert_eq!(presence.presence_ttl, std::time::Duration::from_millis(5_000));
    }
}
