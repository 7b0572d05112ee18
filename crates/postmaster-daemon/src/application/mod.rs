//! Application layer for postmaster-daemon.
//!
//! Orchestrates detection: it knows *what* to do (poll, decode, extract,
//! dispatch) and reaches the outside world only through traits
//! ([`MessageStore`], [`Sleeper`]) that the infrastructure layer implements.
//!
//! # Responsibilities
//!
//! - The monitor's Query → Scan → Process → Idle state machine
//! - Watermark bookkeeping
//! - Synchronous, ordered dispatch to registered listeners
//! - In-process listeners (log notifier, latest-code tracker)

pub mod dispatcher;
pub mod listeners;
pub mod monitor;

pub use dispatcher::{generate_synthetic_code, Dispatcher, SYNTHETIC_CODE_LEN};
pub use listeners::{LatestCode, LatestCodeTracker, LogNotifier};
pub use monitor::{CycleReport, MessageMonitor, MessageStore, ScannedRows, Sleeper, StoreError};
