//! Infrastructure layer for postmaster-daemon.
//!
//! Handles all I/O: reading the Messages database, serving WebSocket
//! subscribers, sleeping the monitor thread, and loading the config file.
//!
//! # What does NOT belong here?
//!
//! - Decoding and extraction (that is `postmaster-core`)
//! - The poll state machine and dispatch order (that is the application layer)

pub mod broadcaster;
pub mod config_file;
pub mod registry;
pub mod sleeper;
pub mod sqlite_store;

pub use broadcaster::{BroadcastError, Broadcaster, DeliveryReport, ServerHandle};
pub use registry::{ChannelSubscriber, OutboundFrame, Subscriber, SubscriberRegistry};
pub use sleeper::ShutdownAwareSleeper;
pub use sqlite_store::SqliteStore;
