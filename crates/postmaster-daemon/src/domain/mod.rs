//! Domain layer for postmaster-daemon.
//!
//! Pure types with no dependencies on SQLite, sockets or the tokio runtime:
//!
//! - Runtime settings for each component
//! - The raw row shape read from the message store
//! - The listener traits the monitor dispatches to

pub mod config;
pub mod handler;
pub mod row;

pub use config::{BroadcasterSettings, DaemonSettings, MonitorSettings};
pub use handler::{DetectionHandler, NoAccessHandler};
pub use row::RawRow;
