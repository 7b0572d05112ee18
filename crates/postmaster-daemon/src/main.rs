//! Postmaster daemon: entry point.
//!
//! Watches the local Messages database for incoming SMS messages, pulls the
//! one-time code out of each one, and pushes it to every connected WebSocket
//! subscriber (typically a browser extension that fills in the code).
//!
//! # Usage
//!
//! ```text
//! postmaster [OPTIONS]
//!
//! Options:
//!   --config <PATH>        Config file [default: platform config dir]
//!   --database <PATH>      Messages database [default: ~/Library/Messages/chat.db]
//!   --bind <IP>            Subscriber listener address [default: 0.0.0.0]
//!   --port <PORT>          Subscriber listener port [default: 3500]
//!   --debug-every <SECS>   Dispatch a random code every SECS seconds
//! ```
//!
//! # Precedence
//!
//! Command-line flags beat environment variables, which beat the config file,
//! which beats the built-in defaults.
//!
//! | Variable                  | Flag              |
//! |---------------------------|-------------------|
//! | `POSTMASTER_CONFIG`       | `--config`        |
//! | `POSTMASTER_DATABASE`     | `--database`      |
//! | `POSTMASTER_BIND`         | `--bind`          |
//! | `POSTMASTER_PORT`         | `--port`          |
//! | `POSTMASTER_DEBUG_EVERY`  | `--debug-every`   |
//!
//! Log verbosity comes from `RUST_LOG` when set, otherwise from `log_level`
//! in the config file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use postmaster_daemon::app::App;
use postmaster_daemon::domain::DaemonSettings;
use postmaster_daemon::infrastructure::config_file::{load_config, DaemonConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Detects one-time codes in incoming SMS messages and broadcasts them.
#[derive(Debug, Parser)]
#[command(
    name = "postmaster",
    about = "Detects one-time codes in incoming SMS messages and broadcasts them over WebSocket",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    ///
    /// When omitted, the platform config directory is searched and a missing
    /// file means "use defaults".
    #[arg(long, env = "POSTMASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the Messages SQLite database.
    #[arg(long, env = "POSTMASTER_DATABASE")]
    database: Option<PathBuf>,

    /// IP address the subscriber listener binds to.
    ///
    /// Use `127.0.0.1` to accept only local subscribers.
    #[arg(long, env = "POSTMASTER_BIND")]
    bind: Option<String>,

    /// TCP port the subscriber listener binds to.
    #[arg(long, env = "POSTMASTER_PORT")]
    port: Option<u16>,

    /// Dispatch a random six-digit code every SECS seconds (for testing
    /// subscribers without receiving real messages).
    #[arg(
        long,
        value_name = "SECS",
        env = "POSTMASTER_DEBUG_EVERY",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    debug_every: Option<u64>,
}

impl Cli {
    /// Layers the CLI overrides on top of `config`.
    fn apply_to(&self, config: &mut DaemonConfig) {
        if let Some(database) = &self.database {
            config.monitor.database_path = database.clone();
        }
        if let Some(bind) = &self.bind {
            config.broadcaster.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.broadcaster.port = port;
        }
    }

    /// Converts the config file plus CLI overrides into runtime settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting bind address is not a valid IP.
    fn into_settings(self, mut config: DaemonConfig) -> anyhow::Result<DaemonSettings> {
        self.apply_to(&mut config);
        let mut settings = config
            .into_settings()
            .context("invalid configuration")?;
        settings.debug_every = self.debug_every.map(Duration::from_secs);
        Ok(settings)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config file is read before logging starts because it carries the
    // default log level.
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let settings = cli.into_settings(config)?;

    info!(
        "postmaster starting: database={}, subscribers=ws://{}{}",
        settings.monitor.database_path.display(),
        settings.broadcaster.bind_addr,
        settings.broadcaster.path
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let app = App::new(settings, running)?;
    let latest = app.latest_code();

    app.run().await?;

    match latest.latest() {
        Some(code) => info!("postmaster stopped; last code was {}", code.code),
        None => info!("postmaster stopped; no codes detected"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
