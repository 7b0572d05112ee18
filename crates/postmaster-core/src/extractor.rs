//! One-time code extraction with context-based ranking.
//!
//! A single pattern cannot tell a 6-digit OTP from a 6-digit amount or a phone
//! number fragment, so extraction happens in stages:
//!
//! 1. **Discovery** – one regex finds every code-shaped substring
//!    (`G-123456`, `123-456` / `1234-5678`, or a bare run of 4–7 digits).
//! 2. **Sanitisation** – prefixes and dashes are stripped; anything that is
//!    not all digits afterwards is discarded.
//! 3. **Scoring** – the 60 characters before each candidate are searched for
//!    known vendor/context phrases; every phrase found adds [`PHRASE_SCORE`].
//! 4. **Ranking** – highest score first, earlier position wins ties.
//! 5. **De-duplication** – the first occurrence of each code value is kept.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Number of characters before a candidate that are searched for phrases.
pub const CONTEXT_WINDOW_CHARS: usize = 60;

/// Score added for each context phrase found in a candidate's window.
pub const PHRASE_SCORE: u32 = 5;

/// Lower-case phrases that indicate the following number is a one-time code.
pub const CONTEXT_PHRASES: &[&str] = &[
    "verification code",
    "verificatiecode",
    "one-time code",
    "one time code",
    "sms-code",
    "sms code",
    "login code",
    "authentication code",
    "confirmation code",
    "security code",
    "access code",
    "passcode",
    "two factor",
    "safekey",
    "uber code",
    "tikkie code",
    "your code",
    "code is",
    "code:",
];

/// Code-shaped substrings: `G-` prefixed, dash-grouped, or a bare digit run.
static CANDIDATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:G-)[0-9]{6}|[0-9]{3,4}-[0-9]{3,4}|[0-9]{4,7}")
        .expect("Invalid candidate pattern regex")
});

/// Errors returned by [`extract_codes`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// No code-shaped substring survived discovery and sanitisation.
    #[error("no codes found in message")]
    NoCodesFound,
}

/// A code-shaped substring found in a message, with its ranking score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCandidate {
    /// Sanitised code: digits only.
    pub code: String,
    /// Byte offset of the raw match in the source text.
    pub position: usize,
    /// Sum of [`PHRASE_SCORE`] for each context phrase preceding the match.
    pub score: u32,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Extracts ranked, de-duplicated codes from `text`.
///
/// Callers normally only use the first element: the most likely code.
///
/// # Errors
///
/// Returns [`ExtractError::NoCodesFound`] if the text contains no candidate,
/// or if every candidate was rejected during sanitisation.
///
/// # Examples
///
/// ```rust
/// use postmaster_core::extract_codes;
///
/// let codes = extract_codes("Your Stripe verification code is: 214-576.").unwrap();
/// assert_eq!(codes[0], "214576");
/// ```
pub fn extract_codes(text: &str) -> Result<Vec<String>, ExtractError> {
    let ranked = extract_candidates(text);
    if ranked.is_empty() {
        return Err(ExtractError::NoCodesFound);
    }

    let mut codes: Vec<String> = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        if !codes.contains(&candidate.code) {
            codes.push(candidate.code);
        }
    }
    Ok(codes)
}

/// Returns the single most likely code in `text`.
///
/// # Errors
///
/// Returns [`ExtractError::NoCodesFound`] under the same conditions as
/// [`extract_codes`].
pub fn best_code(text: &str) -> Result<String, ExtractError> {
    extract_codes(text)?
        .into_iter()
        .next()
        .ok_or(ExtractError::NoCodesFound)
}

/// Returns every sanitised candidate in `text`, ranked but not de-duplicated.
///
/// Ranking is score descending, then position ascending.  The result is empty
/// when nothing qualifies.
pub fn extract_candidates(text: &str) -> Vec<CodeCandidate> {
    let mut candidates: Vec<CodeCandidate> = CANDIDATE_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let code = sanitize(m.as_str())?;
            let score = score_context(text, m.start());
            trace!(code = %code, position = m.start(), score, "code candidate");
            Some(CodeCandidate {
                code,
                position: m.start(),
                score,
            })
        })
        .collect();

    // `sort_by` is stable; positions are already ascending, the explicit
    // tie-break keeps that independent of discovery order.
    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.position.cmp(&b.position))
    });
    candidates
}

// ── Stages ────────────────────────────────────────────────────────────────────

/// Normalises a raw match into a digits-only code.
fn sanitize(raw: &str) -> Option<String> {
    let upper = raw.to_uppercase();
    let without_prefix = upper.strip_prefix("G-").unwrap_or(&upper);
    let digits: String = without_prefix.chars().filter(|c| *c != '-').collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

/// Scores the candidate starting at byte offset `start` by its preceding context.
fn score_context(text: &str, start: usize) -> u32 {
    let window = context_window(text, start);
    CONTEXT_PHRASES
        .iter()
        .filter(|phrase| window.contains(*phrase))
        .count() as u32
        * PHRASE_SCORE
}

/// Returns the lower-cased [`CONTEXT_WINDOW_CHARS`] characters before `start`.
fn context_window(text: &str, start: usize) -> String {
    let preceding = &text[..start];
    let skip = preceding
        .chars()
        .count()
        .saturating_sub(CONTEXT_WINDOW_CHARS);
    preceding.chars().skip(skip).collect::<String>().to_lowercase()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dutch_sms_code() {
        let codes = extract_codes("Uw sms-code is: 481243. Deze vervalt over 20 minuten.").unwrap();
        assert_eq!(codes[0], "481243");
    }

    #[test]
    fn test_extract_strips_dash() {
        let codes = extract_codes("Your Stripe verification code is: 214-576.").unwrap();
        assert_eq!(codes[0], "214576");
    }

    #[test]
    fn test_extract_strips_google_prefix() {
        let codes = extract_codes("G-743499 is your Google verification code.").unwrap();
        assert_eq!(codes[0], "743499");
    }

    #[test]
    fn test_extract_google_prefix_is_case_insensitive() {
        let codes = extract_codes("g-743499 is your Google verification code.").unwrap();
        assert_eq!(codes[0], "743499");
    }

    #[test]
    fn test_extract_no_digits_is_no_codes_found() {
        assert_eq!(
            extract_codes("Hi! See you at the station tomorrow."),
            Err(ExtractError::NoCodesFound)
        );
    }

    #[test]
    fn test_extract_short_digit_runs_are_ignored() {
        // Two- and three-digit runs never qualify on their own.
        assert_eq!(
            extract_codes("Meet at 10 on platform 123"),
            Err(ExtractError::NoCodesFound)
        );
    }

    #[test]
    fn test_extract_empty_text_is_no_codes_found() {
        assert_eq!(extract_codes(""), Err(ExtractError::NoCodesFound));
    }

    #[test]
    fn test_phrase_adjacent_candidate_ranks_first() {
        // Arrange: 123456 appears first but has no context phrase.
        let text = "Order ref 123456 received. Your verification code is 654321";

        // Act
        let codes = extract_codes(text).unwrap();

        // Assert
        assert_eq!(codes, vec!["654321".to_string(), "123456".to_string()]);
    }

    #[test]
    fn test_equal_scores_keep_source_order() {
        let codes = extract_codes("Parcel 4821 and parcel 9932 are on their way").unwrap();
        assert_eq!(codes, vec!["4821".to_string(), "9932".to_string()]);
    }

    #[test]
    fn test_duplicates_keep_highest_ranked_occurrence() {
        let codes =
            extract_codes("838123 is your Tesco authentication code.\n@tesco.com #838123").unwrap();
        assert_eq!(codes, vec!["838123".to_string()]);
    }

    #[test]
    fn test_candidates_are_ranked_by_score_then_position() {
        let text = "1111 then 2222. Your login code is 3333";
        let ranked = extract_candidates(text);

        let order: Vec<&str> = ranked.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(order, vec!["3333", "1111", "2222"]);
        assert!(ranked[0].score > 0);
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn test_each_matching_phrase_adds_score() {
        // "verification code" and "code is" both appear in the window.
        let ranked = extract_candidates("Your verification code is 5845");
        assert_eq!(ranked[0].score, 2 * PHRASE_SCORE);
    }

    #[test]
    fn test_phrase_outside_window_does_not_count() {
        let filler = "x".repeat(CONTEXT_WINDOW_CHARS);
        let text = format!("verification code {filler}123456");
        let ranked = extract_candidates(&text);
        assert_eq!(ranked[0].score, 0);
    }

    #[test]
    fn test_window_handles_multibyte_characters() {
        // Must not panic when slicing around the euro sign.
        let ranked = extract_candidates("€€€ SafeKey code is 621740 for €411.34");
        assert_eq!(ranked[0].code, "621740");
    }

    #[test]
    fn test_seven_digit_code_is_found() {
        let codes = extract_codes("Your Coinbase verification code is: 1203227.").unwrap();
        assert_eq!(codes[0], "1203227");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "Ref 5555. Your one-time code: 7777, backup 8888";
        assert_eq!(extract_codes(text), extract_codes(text));
    }

    #[test]
    fn test_best_code_returns_top_ranked() {
        assert_eq!(best_code("Your Uber code is 7866.").unwrap(), "7866");
    }

    #[test]
    fn test_sanitize_rejects_empty_remainder() {
        assert_eq!(sanitize("G-"), None);
        assert_eq!(sanitize("12-34"), Some("1234".to_string()));
    }

    #[test]
    fn test_context_window_is_clamped_to_start() {
        assert_eq!(context_window("Code: 1234", 6), "code: ");
        assert_eq!(context_window("1234", 0), "");
    }
}
