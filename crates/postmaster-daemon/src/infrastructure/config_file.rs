//! TOML configuration file for the daemon.
//!
//! Looked up at `--config <PATH>` when given, otherwise in the platform
//! config directory:
//! - macOS:  `~/Library/Application Support/Postmaster/config.toml`
//! - Linux:  `$XDG_CONFIG_HOME/postmaster/config.toml` (or `~/.config/...`)
//!
//! Every field has a default, so a missing file, a missing table or a missing
//! key all work:
//!
//! ```toml
//! log_level = "debug"
//!
//! [monitor]
//! database_path = "/Users/me/Library/Messages/chat.db"
//! poll_interval_ms = 1000
//! retry_backoff_ms = 5000
//!
//! [broadcaster]
//! bind_address = "127.0.0.1"
//! port = 3500
//! path = "/ws"
//! ping_interval_ms = 2000
//! ```
//!
//! The file schema uses plain strings and milliseconds; [`DaemonConfig::into_settings`]
//! turns it into the typed [`DaemonSettings`] the components run with.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::config::default_database_path;
use crate::domain::{BroadcasterSettings, DaemonSettings, MonitorSettings};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address: {0:?}")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub broadcaster: BroadcasterSection,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// `[monitor]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorSection {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// `[broadcaster]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcasterSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_retry_backoff_ms() -> u64 {
    5000
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3500
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_ping_interval_ms() -> u64 {
    2000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorSection::default(),
            broadcaster: BroadcasterSection::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for BroadcasterSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            path: default_path(),
            ping_interval_ms: default_ping_interval_ms(),
        }
    }
}

impl DaemonConfig {
    /// Converts the file schema into runtime settings.
    ///
    /// `debug_every` is not part of the file; it is left unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` does not
    /// parse as an IP address.
    pub fn into_settings(self) -> Result<DaemonSettings, ConfigError> {
        let ip: IpAddr = self
            .broadcaster
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.broadcaster.bind_address.clone()))?;

        Ok(DaemonSettings {
            monitor: MonitorSettings {
                database_path: self.monitor.database_path,
                poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
                retry_backoff: Duration::from_millis(self.monitor.retry_backoff_ms),
            },
            broadcaster: BroadcasterSettings {
                bind_addr: SocketAddr::new(ip, self.broadcaster.port),
                path: self.broadcaster.path,
                ping_interval: Duration::from_millis(self.broadcaster.ping_interval_ms),
            },
            debug_every: None,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the full path to the config file in the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("config.toml"))
}

/// Loads the configuration.
///
/// With `explicit` set, that file must exist.  Otherwise the platform file is
/// read; if it (or the platform directory) does not exist, defaults are used.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(explicit: Option<&Path>) -> Result<DaemonConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let path = match config_file_path() {
        Ok(path) => path,
        Err(ConfigError::NoPlatformConfigDir) => {
            debug!("no platform config directory; using defaults");
            return Ok(DaemonConfig::default());
        }
        Err(e) => return Err(e),
    };

    match read_config(&path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            Ok(DaemonConfig::default())
        }
        other => other,
    }
}

fn read_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: DaemonConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(cfg)
}

/// Resolves the platform config directory including the `Postmaster` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Postmaster")
        })
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("postmaster"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let cfg: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, DaemonConfig::default());
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.broadcaster.port, 3500);
    }

    #[test]
    fn test_default_config_logs_at_info() {
        // Arrange / Act: no config file at all.
        let cfg = DaemonConfig::default();

        // Assert
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_level, toml::from_str::<DaemonConfig>("").unwrap().log_level);
    }

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        // Arrange / Act
        let cfg: DaemonConfig = toml::from_str("[broadcaster]\nport = 4000\n").unwrap();

        // Assert
        assert_eq!(cfg.broadcaster.port, 4000);
        assert_eq!(cfg.broadcaster.path, "/ws");
        assert_eq!(cfg.monitor.poll_interval_ms, 1000);
    }

    #[test]
    fn test_into_settings_converts_units() {
        // Arrange
        let mut cfg = DaemonConfig::default();
        cfg.broadcaster.bind_address = "127.0.0.1".to_string();
        cfg.broadcaster.port = 0;
        cfg.monitor.retry_backoff_ms = 250;

        // Act
        let settings = cfg.into_settings().unwrap();

        // Assert
        assert_eq!(settings.broadcaster.bind_addr, SocketAddr::from(([127, 0, 0, 1], 0)));
        assert_eq!(settings.monitor.retry_backoff, Duration::from_millis(250));
        assert_eq!(settings.broadcaster.ping_interval, Duration::from_secs(2));
        assert_eq!(settings.debug_every, None);
    }

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let settings = DaemonConfig::default().into_settings().unwrap();
        assert_eq!(settings, DaemonSettings::default());
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut cfg = DaemonConfig::default();
        cfg.broadcaster.bind_address = "localhost:80".to_string();

        let result = cfg.into_settings();

        assert!(matches!(result, Err(ConfigError::InvalidAddress(a)) if a == "localhost:80"));
    }

    #[test]
    fn test_load_explicit_file() {
        let file = write_config("log_level = \"debug\"\n[monitor]\ndatabase_path = \"/tmp/chat.db\"\n");

        let cfg = load_config(Some(file.path())).unwrap();

        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.monitor.database_path, PathBuf::from("/tmp/chat.db"));
    }

    #[test]
    fn test_load_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let result = load_config(Some(&missing));

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_malformed_file_is_a_parse_error() {
        let file = write_config("[broadcaster]\nport = \"not a number\"\n");

        let result = load_config(Some(file.path()));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
