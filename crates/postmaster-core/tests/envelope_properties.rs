//! Integration tests for the envelope decoder through the public API.
//!
//! These tests sweep buffer lengths and payloads to check the decoder's
//! bounds handling and the build-then-decode identity for arbitrary text.

use postmaster_core::envelope::{CLASS_IDENTIFIER, MAGIC, PAYLOAD_OFFSET, TRAILER};
use postmaster_core::{decode, extract_codes, DecodeError};

fn wrap(text: &str) -> Vec<u8> {
    let mut buf = MAGIC.to_vec();
    buf.extend_from_slice(CLASS_IDENTIFIER);
    buf.resize(PAYLOAD_OFFSET, 0x84);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(&TRAILER);
    buf
}

#[test]
fn test_every_short_length_is_too_short() {
    for len in 0..PAYLOAD_OFFSET {
        // Fill with the magic pattern so only the length can be the problem.
        let buf: Vec<u8> = MAGIC.iter().copied().cycle().take(len).collect();
        assert_eq!(
            decode(&buf),
            Err(DecodeError::TooShort {
                needed: PAYLOAD_OFFSET,
                available: len
            }),
            "length {len}"
        );
    }
}

#[test]
fn test_every_wrong_first_byte_is_magic_mismatch() {
    for first in (0u8..=255).filter(|b| *b != MAGIC[0]) {
        let mut buf = wrap("123456");
        buf[0] = first;
        assert_eq!(decode(&buf), Err(DecodeError::MagicMismatch), "first byte {first:#04x}");
    }
}

#[test]
fn test_decode_returns_exact_text_for_various_payloads() {
    let samples = [
        "",
        "a",
        "Your verification code is 123456",
        "Tikkie code: 8890\nDeze code is 5 minuten geldig.",
        "Amex SafeKey verificatiecode is 346020 voor €2.916,24 bij KLM",
        "😀 emoji and ümlauts",
    ];
    for text in samples {
        assert_eq!(decode(&wrap(text)).unwrap(), text);
    }
}

#[test]
fn test_decode_then_extract_pipeline() {
    // The monitor chains these two calls; exercise them together.
    let text = decode(&wrap("G-743499 is your Google verification code.")).unwrap();
    let codes = extract_codes(&text).unwrap();
    assert_eq!(codes[0], "743499");
}
