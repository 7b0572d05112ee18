//! # postmaster-core
//!
//! Shared library for Postmaster containing the message envelope decoder, the
//! one-time-code extractor, and the detection event types that travel from the
//! monitor to every subscriber.
//!
//! This crate has zero dependencies on the message store, sockets, or any
//! async runtime.  Everything in here is pure and deterministic.
//!
//! # Architecture overview (for beginners)
//!
//! Postmaster watches the local Messages database for SMS messages that carry
//! one-time authentication codes and forwards those codes to interested
//! consumers (for example a browser extension connected over a WebSocket).
//!
//! ```text
//! message store row ──► envelope::decode ──► extractor::extract_codes ──► DetectionEvent
//! ```
//!
//! - **`envelope`** – Recovers the UTF-8 text embedded in the legacy binary
//!   ("streamtyped") archive that the Messages app stores per message.
//!
//! - **`extractor`** – Finds code-shaped substrings in that text and ranks
//!   them by the vendor phrases that precede them ("verification code",
//!   "Uber code", ...), so "your code is 481243" beats "€20.00 at 1430".
//!
//! - **`event`** – The `DetectionEvent` handed to listeners and the JSON
//!   envelope written to WebSocket subscribers.

pub mod envelope;
pub mod event;
pub mod extractor;

// Re-export the most-used items at the crate root so callers can write
// `postmaster_core::decode` instead of `postmaster_core::envelope::decode`.
pub use envelope::{decode, DecodeError};
pub use event::{DetectionEvent, DetectionSource, WireMessage};
pub use extractor::{best_code, extract_candidates, extract_codes, CodeCandidate, ExtractError};
