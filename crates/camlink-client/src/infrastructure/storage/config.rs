//! TOML-based configuration for the camlink client.
//!
//! Stored at the platform config directory:
//! - Windows:  `%APPDATA%\camlink\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/camlink/config.toml` or `~/.config/camlink/config.toml`
//! - macOS:    `~/Library/Application Support/camlink/config.toml`
//!
//! ```toml
//! [camera]
//! ip = "192.168.0.1"
//! port = 55740
//! use_emulator = false
//!
//! [discovery]
//! interval_ms = 1000
//! probe_timeout_ms = 500
//! auto_reconnect = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a serde default, so partial files and files written by
//! older versions load cleanly.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camlink_core::{WifiTarget, COMMAND_PORT, DEFAULT_CAMERA_IP, EMULATOR_CAMERA_IP};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::application::orchestrator::OrchestratorConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the camera's command channel lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_camera_ip")]
    pub ip: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Target the desktop emulator instead of a real camera; overrides `ip`.
    #[serde(default)]
    pub use_emulator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"camlink_client=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_camera_ip() -> IpAddr {
    DEFAULT_CAMERA_IP
}
fn default_port() -> u16 {
    COMMAND_PORT
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_probe_timeout_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ip: default_camera_ip(),
            port: default_port(),
            use_emulator: false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            auto_reconnect: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// The camera address after applying the emulator switch.
    pub fn wifi_target(&self) -> WifiTarget {
        let ip = if self.camera.use_emulator {
            EMULATOR_CAMERA_IP
        } else {
            self.camera.ip
        };
        WifiTarget::new(ip, self.camera.port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.probe_timeout_ms)
    }

    /// Runtime configuration for the orchestrator.  The permission timeout
    /// is not user-configurable and keeps its default.
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            wifi_target: self.wifi_target(),
            discovery_interval: Duration::from_millis(self.discovery.interval_ms),
            auto_reconnect: self.discovery.auto_reconnect,
            ..OrchestratorConfig::default()
        }
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the platform path, or defaults if it is absent.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, returning defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}; using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("camlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("camlink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("camlink"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_the_camera_command_port() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.wifi_target(), WifiTarget::default());
        assert!(cfg.discovery.auto_reconnect);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_emulator_switch_overrides_ip() {
        let mut cfg = AppConfig::default();
        cfg.camera.use_emulator = true;
        assert_eq!(cfg.wifi_target().ip, EMULATOR_CAMERA_IP);
        assert_eq!(cfg.wifi_target().port, COMMAND_PORT);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[camera]
port = 15740

[discovery]
auto_reconnect = false
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.camera.port, 15740);
        assert_eq!(cfg.camera.ip, DEFAULT_CAMERA_IP);
        assert!(!cfg.discovery.auto_reconnect);
        assert_eq!(cfg.discovery.interval_ms, 1000);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_orchestrator_config_carries_discovery_settings() {
        let mut cfg = AppConfig::default();
        cfg.discovery.interval_ms = 250;
        cfg.discovery.auto_reconnect = false;

        let runtime = cfg.to_orchestrator_config();

        assert_eq!(runtime.discovery_interval, Duration::from_millis(250));
        assert!(!runtime.auto_reconnect);
        assert_eq!(runtime.permission_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_via_temp_dir() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.camera.use_emulator = true;
        cfg.logging.level = "debug".into();

        // Act
        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not toml").unwrap();

        let err = load_config_from(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("camlink/config.toml"));
        }
    }
}
