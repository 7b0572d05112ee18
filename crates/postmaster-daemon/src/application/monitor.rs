//! MessageMonitor: turns the message store into a stream of detection events.
//!
//! The monitor is a single-threaded state machine:
//!
//! ```text
//!            ┌──────────── check fails: notify once, back off ─┐
//!  AccessCheck ◄────────────────────────────────────────────────┘
//!      │ ok
//!      ▼
//!    Query ──── fails: back off ───► Query
//!      │ rows
//!      ▼
//!    Scan   (bad rows logged and skipped one by one)
//!      │
//!      ▼
//!   Process (decode → extract → advance watermark → dispatch)
//!      │
//!      ▼
//!    Idle ──► Query
//! ```
//!
//! The `running` flag is checked at every state boundary, so clearing it stops
//! the loop within one sleep slice.
//!
//! # Watermark policy
//!
//! The watermark is the timestamp of the last processed row.  A row counts as
//! processed once it has been decoded and extracted *or* has failed either
//! step: failing rows are never retried (at-most-once).  The watermark is
//! advanced before listeners run, and it never moves backwards.
//!
//! On the very first query (watermark `0`) only the most recent row is
//! fetched.  That seeds the watermark without replaying the whole history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use postmaster_core::{envelope, extractor, DetectionEvent, ExtractError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::dispatcher::Dispatcher;
use crate::domain::{DetectionHandler, MonitorSettings, NoAccessHandler, RawRow};

/// Errors reported by a [`MessageStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be opened at all.
    #[error("failed to open message store at {path}: {reason}")]
    Open { path: String, reason: String },

    /// The store is not readable (missing permission, missing table).
    #[error("message store is not accessible: {0}")]
    Access(String),

    /// A query could not be prepared or executed.
    #[error("message store query failed: {0}")]
    Query(String),

    /// A single row could not be read.
    #[error("failed to scan row: {0}")]
    Row(String),
}

/// All rows returned by one query, each read independently.
pub type ScannedRows = Vec<Result<RawRow, StoreError>>;

/// Minimal read access to the message store.
///
/// Only SMS-origin rows are ever returned.
#[cfg_attr(test, mockall::automock)]
pub trait MessageStore: Send {
    /// Checks that the store can be read.
    fn check_access(&self) -> Result<(), StoreError>;

    /// Returns the single most recent row (or nothing for an empty store).
    fn latest_row(&self) -> Result<ScannedRows, StoreError>;

    /// Returns every row with `timestamp > watermark`, oldest first.
    fn rows_after(&self, watermark: i64) -> Result<ScannedRows, StoreError>;
}

/// Blocking sleep used between monitor states.
///
/// Injected so tests can run the loop without real time passing.
pub trait Sleeper: Send {
    fn sleep(&self, duration: Duration);
}

/// What happened during one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows successfully read from the store.
    pub rows: usize,
    /// Rows that could not be read and were skipped.
    pub scan_failures: usize,
    /// Rows whose envelope could not be decoded.
    pub decode_failures: usize,
    /// Rows whose text contained no code.
    pub without_code: usize,
    /// Codes dispatched to listeners.
    pub dispatched: usize,
}

/// Polls a [`MessageStore`] and dispatches every detected code.
pub struct MessageMonitor<S> {
    store: S,
    sleeper: Box<dyn Sleeper>,
    settings: MonitorSettings,
    dispatcher: Dispatcher,
    no_access_handler: Option<Box<dyn NoAccessHandler>>,
    watermark: i64,
}

impl<S: MessageStore> MessageMonitor<S> {
    /// Creates a monitor with an empty watermark and no listeners.
    pub fn new(store: S, sleeper: Box<dyn Sleeper>, settings: MonitorSettings) -> Self {
        Self {
            store,
            sleeper,
            settings,
            dispatcher: Dispatcher::new(),
            no_access_handler: None,
            watermark: 0,
        }
    }

    /// Appends a listener; every registration fires, in registration order.
    pub fn register_detection_handler<H>(&mut self, handler: H)
    where
        H: DetectionHandler + 'static,
    {
        self.dispatcher.register(handler);
    }

    /// Sets the listener notified when the store cannot be read.
    ///
    /// Only one is kept; registering again replaces the previous one.
    pub fn register_no_access_handler<H>(&mut self, handler: H)
    where
        H: NoAccessHandler + 'static,
    {
        self.no_access_handler = Some(Box::new(handler));
    }

    /// Returns a handle to this monitor's listener list.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Timestamp of the last processed row (`0` before the first row).
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Dispatches `code` directly, without touching the store.
    pub fn inject_synthetic_code(&self, code: impl Into<String>) {
        self.dispatcher.inject_synthetic(code);
    }

    /// Runs the monitor until `running` is cleared.
    ///
    /// Store failures are never fatal: they are logged and retried after
    /// `retry_backoff`.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(watermark = self.watermark, "message monitor started");

        if !self.await_store_access(running) {
            info!("message monitor stopped before the store became accessible");
            return;
        }

        while running.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(report) => {
                    if report.rows > 0 || report.scan_failures > 0 {
                        debug!(?report, watermark = self.watermark, "poll cycle complete");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to query message store");
                    self.sleeper.sleep(self.settings.retry_backoff);
                    continue;
                }
            }

            if !running.load(Ordering::Relaxed) {
                break;
            }
            self.sleeper.sleep(self.settings.poll_interval);
        }

        info!(watermark = self.watermark, "message monitor stopped");
    }

    /// Runs exactly one Query → Scan → Process cycle.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the query itself fails; individual row
    /// failures are counted in the report instead.
    pub fn poll_once(&mut self) -> Result<CycleReport, StoreError> {
        // ── Query ─────────────────────────────────────────────────────────────
        let scanned = if self.watermark == 0 {
            self.store.latest_row()?
        } else {
            self.store.rows_after(self.watermark)?
        };

        // ── Scan ──────────────────────────────────────────────────────────────
        let mut report = CycleReport::default();
        let mut rows = Vec::with_capacity(scanned.len());
        for result in scanned {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable row");
                    report.scan_failures += 1;
                }
            }
        }
        report.rows = rows.len();

        // ── Process ───────────────────────────────────────────────────────────
        for row in rows {
            self.process_row(row, &mut report);
        }

        Ok(report)
    }

    /// Repeatedly checks the store until it is readable or shutdown is requested.
    ///
    /// The no-access handler fires once per run of consecutive failures.
    fn await_store_access(&mut self, running: &AtomicBool) -> bool {
        let mut notified = false;

        while running.load(Ordering::Relaxed) {
            match self.store.check_access() {
                Ok(()) => return true,
                Err(e) => {
                    warn!(error = %e, "cannot access message store");
                    if !notified {
                        if let Some(handler) = &self.no_access_handler {
                            handler.on_no_access();
                        }
                        notified = true;
                    }
                    self.sleeper.sleep(self.settings.retry_backoff);
                }
            }
        }
        false
    }

    fn process_row(&mut self, row: RawRow, report: &mut CycleReport) {
        let text = match envelope::decode(&row.attributed_body) {
            Ok(text) => text,
            Err(e) => {
                warn!(guid = %row.guid, error = %e, "failed to decode message envelope");
                self.advance_watermark(row.timestamp);
                report.decode_failures += 1;
                return;
            }
        };

        match extractor::extract_codes(&text) {
            Ok(codes) => {
                info!(guid = %row.guid, codes = ?codes, "discovered codes");
                self.advance_watermark(row.timestamp);
                if let Some(top) = codes.into_iter().next() {
                    self.dispatcher
                        .dispatch(&DetectionEvent::from_store(top, row.guid));
                    report.dispatched += 1;
                }
            }
            Err(ExtractError::NoCodesFound) => {
                debug!(guid = %row.guid, "no codes found in message");
                self.advance_watermark(row.timestamp);
                report.without_code += 1;
            }
        }
    }

    fn advance_watermark(&mut self, timestamp: i64) {
        if timestamp > self.watermark {
            self.watermark = timestamp;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
