//! Text clean-up for extracted lines and finalized question bodies.
//!
//! Text layers of exam PDFs carry artefacts that break pattern matching:
//! zero-width spaces between `Q.` and the number, soft hyphens, stray CR
//! characters, runs of spaces from justified layout. These rules are pure
//! `&str → String` passes applied at two points:
//!
//! 1. [`clean_line`] — every text block, before noise filtering and
//!    classification.
//! 2. [`clean_body`] — a question body, once, when the question is finalized.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise one extracted text line.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim surrounding whitespace
pub fn clean_line(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Normalise a finalized question body.
///
/// Whitespace runs inside a line collapse to one space. When
/// `keep_line_breaks` is false the whole body collapses to one paragraph.
pub fn clean_body(input: &str, keep_line_breaks: bool) -> String {
    if keep_line_breaks {
        input
            .lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        collapse_whitespace(input)
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Body rule: collapse whitespace ──────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").into_owned()
}
