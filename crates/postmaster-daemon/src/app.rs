//! Application lifecycle: builds every component and runs them until shutdown.
//!
//! # Start order
//!
//! 1. Open the message store (fatal on failure).
//! 2. Build the monitor and register listeners in this order: log notifier,
//!    latest-code tracker, broadcaster.
//! 3. Bind the subscriber listener (fatal on failure).
//! 4. Start the optional debug trigger.
//! 5. Run the monitor on a blocking thread until `running` is cleared.
//!
//! # Stop order
//!
//! Clearing `running` stops the monitor within one sleep slice, the accept
//! loop within one accept timeout, each subscriber session on its next
//! keepalive tick and the debug trigger within one poll window.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{info, warn};

use crate::application::{
    generate_synthetic_code, Dispatcher, LatestCodeTracker, LogNotifier, MessageMonitor,
    MessageStore,
};
use crate::domain::DaemonSettings;
use crate::infrastructure::{Broadcaster, ShutdownAwareSleeper, SqliteStore};

const DEBUG_TRIGGER_POLL: Duration = Duration::from_millis(200);

/// Owns every component of a running daemon.
pub struct App<S = SqliteStore> {
    settings: DaemonSettings,
    running: Arc<AtomicBool>,
    monitor: MessageMonitor<S>,
    broadcaster: Arc<Broadcaster>,
    latest: LatestCodeTracker,
}

impl App<SqliteStore> {
    /// Opens the configured database and wires up all components.
    ///
    /// # Errors
    ///
    /// Returns an error if the message store cannot be opened.
    pub fn new(settings: DaemonSettings, running: Arc<AtomicBool>) -> anyhow::Result<Self> {
        let store = SqliteStore::open(&settings.monitor.database_path).with_context(|| {
            format!(
                "cannot open message database {}",
                settings.monitor.database_path.display()
            )
        })?;
        Ok(Self::with_store(store, settings, running))
    }
}

impl<S: MessageStore + 'static> App<S> {
    /// Wires up all components around an already opened store.
    pub fn with_store(store: S, settings: DaemonSettings, running: Arc<AtomicBool>) -> Self {
        let sleeper = ShutdownAwareSleeper::new(Arc::clone(&running));
        let mut monitor = MessageMonitor::new(store, Box::new(sleeper), settings.monitor.clone());

        let latest = LatestCodeTracker::new();
        let broadcaster = Arc::new(Broadcaster::new(settings.broadcaster.clone()));

        monitor.register_detection_handler(LogNotifier);
        monitor.register_detection_handler(latest.clone());
        monitor.dispatcher().register_shared(broadcaster.clone());
        monitor.register_no_access_handler(|| {
            warn!(
                "the Messages database is not readable; grant Full Disk Access to this \
                 program in System Settings > Privacy & Security"
            );
        });

        Self {
            settings,
            running,
            monitor,
            broadcaster,
            latest,
        }
    }

    /// Handle to the monitor's listeners, for registering more or injecting codes.
    pub fn dispatcher(&self) -> Dispatcher {
        self.monitor.dispatcher()
    }

    /// Shared view of the most recently detected code.
    pub fn latest_code(&self) -> LatestCodeTracker {
        self.latest.clone()
    }

    /// The broadcaster serving WebSocket subscribers.
    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Runs every component until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber listener cannot be bound or the
    /// monitor thread panics.
    pub async fn run(self) -> anyhow::Result<()> {
        let server = self
            .broadcaster
            .listen_and_serve(Arc::clone(&self.running))
            .await
            .context("failed to start subscriber listener")?;

        let debug_task = self.settings.debug_every.map(|every| {
            info!("debug trigger enabled: synthetic code every {every:?}");
            spawn_debug_trigger(self.monitor.dispatcher(), every, Arc::clone(&self.running))
        });

        let running = Arc::clone(&self.running);
        let mut monitor = self.monitor;
        let monitor_result = tokio::task::spawn_blocking(move || monitor.run(&running)).await;

        // Whatever stopped the monitor, stop everything else too.
        self.running.store(false, Ordering::Relaxed);
        server.join().await;
        if let Some(task) = debug_task {
            if let Err(e) = task.await {
                warn!("debug trigger task failed: {e}");
            }
        }

        monitor_result.context("message monitor thread panicked")?;
        Ok(())
    }
}

/// Dispatches a random code every `every` until `running` is cleared.
fn spawn_debug_trigger(
    dispatcher: Dispatcher,
    every: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        // The first tick completes immediately; the first code is due one period in.
        ticker.tick().await;

        while running.load(Ordering::Relaxed) {
            if timeout(DEBUG_TRIGGER_POLL, ticker.tick()).await.is_ok() {
                dispatcher.inject_synthetic(generate_synthetic_code());
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
