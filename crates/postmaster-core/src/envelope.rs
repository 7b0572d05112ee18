//! Decoder for the legacy "streamtyped" message envelope.
//!
//! The Messages database stores the body of each message in the
//! `attributedBody` column as an archived `NSAttributedString`.  We do not
//! interpret the object graph; we only locate the one embedded UTF-8 string.
//!
//! Layout (only the parts we rely on):
//! ```text
//! [magic:2 = 04 0B][class identifier @0x02, 10 bytes]...[text @0x7A ...][trailer 86 84 02 69 49 01]...
//! ```
//!
//! The text always starts at offset `0x7A` and runs up to the first trailer
//! sequence found after that offset.

use thiserror::Error;

/// Two-byte prefix every streamtyped archive starts with.
pub const MAGIC: [u8; 2] = [0x04, 0x0b];

/// Class identifier that follows the magic.
pub const CLASS_IDENTIFIER: &[u8] = b"streamtyped";

/// Offset of the class identifier field.
pub const CLASS_IDENTIFIER_OFFSET: usize = 0x02;

/// Length of the class identifier field that is validated.
pub const CLASS_IDENTIFIER_LEN: usize = 0x0a;

/// Offset at which the embedded message text begins.
pub const PAYLOAD_OFFSET: usize = 0x7a;

/// Byte sequence terminating the embedded message text.
pub const TRAILER: [u8; 6] = [0x86, 0x84, 0x02, 0x69, 0x49, 0x01];

/// Errors that can occur while decoding an envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is shorter than the fixed header.
    #[error("envelope too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    /// The buffer does not begin with the streamtyped magic bytes.
    #[error("envelope magic mismatch")]
    MagicMismatch,

    /// The class identifier field does not read `streamtyped`.
    #[error("envelope class identifier mismatch")]
    IdentifierMismatch,

    /// No trailer sequence was found after the payload offset.
    #[error("envelope has no message trailer")]
    NoTrailer,

    /// The bytes before the trailer are not valid UTF-8.
    #[error("envelope message is not valid UTF-8: {0}")]
    InvalidText(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes the message text embedded in a streamtyped `buffer`.
///
/// # Errors
///
/// Returns [`DecodeError`] if the buffer is truncated, carries the wrong
/// magic or class identifier, has no trailer, or the text is not UTF-8.
///
/// # Examples
///
/// ```rust
/// use postmaster_core::envelope::{decode, MAGIC, PAYLOAD_OFFSET, TRAILER, CLASS_IDENTIFIER};
///
/// let mut buf = MAGIC.to_vec();
/// buf.extend_from_slice(CLASS_IDENTIFIER);
/// buf.resize(PAYLOAD_OFFSET, 0);
/// buf.extend_from_slice("Your code is 123456".as_bytes());
/// buf.extend_from_slice(&TRAILER);
///
/// assert_eq!(decode(&buf).unwrap(), "Your code is 123456");
/// ```
pub fn decode(buffer: &[u8]) -> Result<String, DecodeError> {
    if buffer.len() < PAYLOAD_OFFSET {
        return Err(DecodeError::TooShort {
            needed: PAYLOAD_OFFSET,
            available: buffer.len(),
        });
    }

    if !buffer.starts_with(&MAGIC) {
        return Err(DecodeError::MagicMismatch);
    }

    // The header is at least PAYLOAD_OFFSET bytes long, so this slice is in bounds.
    let identifier =
        &buffer[CLASS_IDENTIFIER_OFFSET..CLASS_IDENTIFIER_OFFSET + CLASS_IDENTIFIER_LEN];
    if identifier != &CLASS_IDENTIFIER[..CLASS_IDENTIFIER_LEN] {
        return Err(DecodeError::IdentifierMismatch);
    }

    let body = &buffer[PAYLOAD_OFFSET..];
    let end = find_subsequence(body, &TRAILER).ok_or(DecodeError::NoTrailer)?;

    std::str::from_utf8(&body[..end])
        .map(str::to_owned)
        .map_err(|e| DecodeError::InvalidText(e.to_string()))
}

/// Returns the index of the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
