//! postmaster-daemon library crate.
//!
//! This crate turns the local Messages database into a stream of detected
//! one-time codes and pushes every code to WebSocket subscribers (the browser
//! extension) and to in-process listeners.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Messages chat.db (SQLite)
//!         ↓  poll
//! [postmaster-daemon]
//!   ├── domain/           Settings, RawRow, listener traits
//!   ├── application/      MessageMonitor state machine, Dispatcher, listeners
//!   ├── infrastructure/
//!   │     ├── sqlite_store/  Read-only message store (rusqlite)
//!   │     ├── broadcaster/   WebSocket fan-out (tokio-tungstenite)
//!   │     ├── sleeper/       Shutdown-aware sleeping for the monitor thread
//!   │     └── config_file/   TOML configuration on disk
//!   └── app               Wires everything together; start/stop lifecycle
//!         ↓  JSON over WebSocket
//! Browser extension
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `postmaster-core` only; the store
//!   and the clock are reached through traits.
//! - `infrastructure` implements those traits with SQLite, tokio and
//!   tungstenite.

/// Domain layer: plain types and listener traits (no I/O).
pub mod domain;

/// Application layer: the polling monitor and detection dispatch.
pub mod application;

/// Infrastructure layer: SQLite store, WebSocket broadcaster, config file.
pub mod infrastructure;

/// Lifecycle object that owns and runs all components.
pub mod app;
