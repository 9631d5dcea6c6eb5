//! camlink command-line entry point.
//!
//! Wires the TCP session layer, configuration file, and a console observer to
//! a [`ConnectionOrchestrator`] and runs one command:
//!
//! ```text
//! camlink wifi       connect over WiFi, then keep the link healed until Ctrl+C
//! camlink usb        connect over USB
//! camlink discover   poll for the camera until Ctrl+C
//! camlink status     print the configured target and current status
//! ```
//!
//! Precedence for settings: command-line flags, then `config.toml`, then
//! built-in defaults.  `RUST_LOG` overrides the configured log level.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use camlink_client::application::context::ConnectivityContext;
use camlink_client::application::observers::{ConnectionObserver, ObserverSlot};
use camlink_client::application::orchestrator::{Collaborators, ConnectionOrchestrator};
use camlink_client::infrastructure::{
    network::TcpSessionLayer,
    storage::config::{self, AppConfig, ConfigError},
    ui_bridge,
    usb::{ChannelPermissionBroker, UnavailableUsbHost},
};
use camlink_core::ErrorCode;

#[derive(Debug, Parser)]
#[command(
    name = "camlink",
    about = "Connect to a camera over USB or WiFi and keep the session alive",
    version
)]
struct Cli {
    /// Path to the configuration file (defaults to the platform config dir).
    #[arg(long, env = "CAMLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Camera IP address, overriding the config file.
    #[arg(long, env = "CAMLINK_IP")]
    ip: Option<IpAddr>,

    /// Camera command port, overriding the config file.
    #[arg(long, env = "CAMLINK_PORT")]
    port: Option<u16>,

    /// Target the desktop emulator address.
    #[arg(long)]
    emulator: bool,

    /// Log level, overriding the config file.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Connect over WiFi and reconnect automatically until Ctrl+C.
    Wifi,
    /// Connect over USB.
    Usb,
    /// Poll the camera's reachability until Ctrl+C.
    Discover,
    /// Print the current status.
    Status,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => match config::load_config() {
                Ok(cfg) => cfg,
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                Err(e) => return Err(e).context("loading platform config"),
            },
        };
        if let Some(ip) = self.ip {
            cfg.camera.ip = ip;
        }
        if let Some(port) = self.port {
            cfg.camera.port = port;
        }
        if self.emulator {
            cfg.camera.use_emulator = true;
        }
        if let Some(level) = &self.log_level {
            cfg.logging.level = level.clone();
        }
        Ok(cfg)
    }
}

/// Prints the rolling log to stdout.
struct ConsoleObserver;

impl ConnectionObserver for ConsoleObserver {
    fn on_log_update(&self, text: &str) {
        if let Some(line) = text.lines().last() {
            println!("{line}");
        }
    }

    fn on_connection_error(&self, code: ErrorCode, reason: &str) {
        eprintln!("error {}: {reason}", code.code());
    }

    fn on_camera_name_update(&self, name: &str) {
        println!("camera: {name}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    let context = ConnectivityContext::new();
    context
        .observers()
        .register(ObserverSlot::Main, Arc::new(ConsoleObserver));

    let tcp = Arc::new(TcpSessionLayer::with_probe_timeout(
        Arc::clone(context.kill_switch()),
        cfg.probe_timeout(),
    ));
    let orchestrator = ConnectionOrchestrator::new(
        cfg.to_orchestrator_config(),
        context,
        Collaborators {
            session_layer: tcp.clone(),
            probe: tcp,
            usb: Arc::new(UnavailableUsbHost),
            permissions: Arc::new(ChannelPermissionBroker::auto_grant()),
        },
    );
    orchestrator.init();
    info!("camlink targeting {}", cfg.wifi_target());

    match cli.command {
        Command::Wifi => {
            if let Err(e) = orchestrator.connect_wifi().await {
                warn!("initial WiFi connect failed: {e}");
                orchestrator.report_error(e.code(), &e.to_string());
            }
            wait_for_ctrl_c().await;
        }
        Command::Usb => {
            orchestrator.connect_usb().await;
        }
        Command::Discover => {
            orchestrator.report_error(ErrorCode::NetworkNotConnected, "discovery requested");
            wait_for_ctrl_c().await;
        }
        Command::Status => {}
    }

    if let Some(status) = ui_bridge::get_status(&orchestrator).data {
        println!("{}", toml::to_string_pretty(&status)?);
    }
    orchestrator.shutdown().await;
    info!("camlink stopped");
    Ok(())
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; shutting down"),
        Err(e) => warn!("failed to listen for Ctrl+C: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommand_and_overrides() {
        // Arrange / Act
        let cli = Cli::parse_from(["camlink", "--ip", "10.0.0.5", "--port", "15740", "wifi"]);

        // Assert
        assert!(matches!(cli.command, Command::Wifi));
        assert_eq!(cli.ip, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(cli.port, Some(15740));
    }

    #[test]
    fn test_cli_overrides_apply_to_loaded_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera]\nport = 1234\n").unwrap();
        let cli = Cli::parse_from([
            "camlink",
            "--config",
            path.to_str().unwrap(),
            "--emulator",
            "status",
        ]);

        // Act
        let cfg = cli.load_config().unwrap();

        // Assert
        assert_eq!(cfg.camera.port, 1234);
        assert_eq!(cfg.wifi_target().ip, camlink_core::EMULATOR_CAMERA_IP);
    }
}
