//! Runtime settings for the daemon.
//!
//! These are the resolved, strongly-typed values the components run with
//! (`Duration`s and `SocketAddr`s).  The on-disk TOML schema lives in
//! [`crate::infrastructure::config_file`]; `main.rs` layers CLI overrides on
//! top of it and converts the result into a [`DaemonSettings`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the message monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Path to the Messages SQLite database.
    pub database_path: PathBuf,
    /// Idle time between two successful poll cycles.
    pub poll_interval: Duration,
    /// Backoff after a failed query or a failed access check.
    pub retry_backoff: Duration,
}

/// Settings for the WebSocket broadcaster.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcasterSettings {
    /// Address the subscriber listener binds to.
    pub bind_addr: SocketAddr,
    /// Request path subscribers must upgrade on (e.g. `/ws`).
    pub path: String,
    /// Interval between keepalive pings on each connection.
    pub ping_interval: Duration,
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DaemonSettings {
    pub monitor: MonitorSettings,
    pub broadcaster: BroadcasterSettings,
    /// When set, a synthetic code is dispatched at this interval.
    pub debug_every: Option<Duration>,
}

/// Returns `~/Library/Messages/chat.db`, or the relative path when `HOME` is unset.
pub fn default_database_path() -> PathBuf {
    let relative = PathBuf::from("Library/Messages/chat.db");
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(relative),
        None => relative,
    }
}

impl Default for MonitorSettings {
    /// | Field          | Default                      |
    /// |----------------|------------------------------|
    /// | database_path  | `~/Library/Messages/chat.db` |
    /// | poll_interval  | 1 second                     |
    /// | retry_backoff  | 5 seconds                    |
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

impl Default for BroadcasterSettings {
    /// | Field          | Default        |
    /// |----------------|----------------|
    /// | bind_addr      | `0.0.0.0:3500` |
    /// | path           | `/ws`          |
    /// | ping_interval  | 2 seconds      |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3500)),
            path: "/ws".to_string(),
            ping_interval: Duration::from_secs(2),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
