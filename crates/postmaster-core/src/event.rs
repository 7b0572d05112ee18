//! Detection events and the subscriber wire format.
//!
//! A [`DetectionEvent`] is produced once per detected code and passed to every
//! registered listener.  The WebSocket broadcaster turns it into a
//! [`WireMessage`], the JSON document the browser extension understands:
//!
//! ```json
//! { "code": "mfa_code", "payload": { "mfa_code": { "code": "481243" } } }
//! ```

use serde::{Deserialize, Serialize};

/// The `code` discriminator used for one-time code messages.
pub const MFA_CODE_KIND: &str = "mfa_code";

/// Where a detected code came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionSource {
    /// Decoded from a message-store row.
    Store {
        /// GUID of the row the code was extracted from.
        guid: String,
    },
    /// Generated on demand (debug trigger) without touching the store.
    Synthetic,
}

/// A single detected code.
///
/// Identical codes detected in different poll cycles are distinct events;
/// nothing de-duplicates across polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    /// The sanitised code.
    pub code: String,
    /// Origin of the code, used for logging only.
    pub source: DetectionSource,
}

impl DetectionEvent {
    /// Creates an event for a code extracted from the row identified by `guid`.
    pub fn from_store(code: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source: DetectionSource::Store { guid: guid.into() },
        }
    }

    /// Creates an event for a caller-supplied code.
    pub fn synthetic(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source: DetectionSource::Synthetic,
        }
    }
}

// ── Wire format ───────────────────────────────────────────────────────────────

/// JSON document written to every WebSocket subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message kind; always [`MFA_CODE_KIND`] today.
    pub code: String,
    pub payload: WirePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayload {
    pub mfa_code: WireMfaCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMfaCode {
    pub code: String,
}

impl WireMessage {
    /// Builds the `mfa_code` message for `code`.
    pub fn mfa_code(code: impl Into<String>) -> Self {
        Self {
            code: MFA_CODE_KIND.to_string(),
            payload: WirePayload {
                mfa_code: WireMfaCode { code: code.into() },
            },
        }
    }

    /// Serializes the message to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error; this cannot happen for the
    /// plain string fields used here, but the signature keeps callers honest.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&DetectionEvent> for WireMessage {
    fn from(event: &DetectionEvent) -> Self {
        Self::mfa_code(event.code.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_message_matches_extension_format() {
        // Arrange
        let msg = WireMessage::mfa_code("481243");

        // Act
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        // Assert
        assert_eq!(
            json,
            serde_json::json!({
                "code": "mfa_code",
                "payload": { "mfa_code": { "code": "481243" } }
            })
        );
    }

    #[test]
    fn test_wire_message_from_event_carries_code_only() {
        let event = DetectionEvent::from_store("214576", "guid-1");
        let msg = WireMessage::from(&event);
        assert_eq!(msg, WireMessage::mfa_code("214576"));
        assert!(!msg.to_json().unwrap().contains("guid-1"));
    }

    #[test]
    fn test_from_store_records_guid() {
        let event = DetectionEvent::from_store("1808", "abc");
        assert_eq!(
            event.source,
            DetectionSource::Store {
                guid: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_synthetic_event_source() {
        let event = DetectionEvent::synthetic("000000");
        assert_eq!(event.source, DetectionSource::Synthetic);
        assert_eq!(event.code, "000000");
    }
}
