//! Error types for the pdf2quiz library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`Pdf2QuizError`] — **Fatal**: the document cannot be read at all
//!   (missing file, not a PDF, wrong password, pdfium unavailable, invalid
//!   configuration). Returned as `Err` from the top-level `extract*` functions.
//!
//! * [`Diagnostic`] — **Non-fatal**: one block, option or page was odd but the
//!   parse carried on. Collected into [`crate::output::ExtractionOutput`] so
//!   callers can audit what was dropped or guessed.
//!
//! A parse over a readable document always returns the questions it could
//! assemble, even if there are none.

use crate::model::Letter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2quiz library.
#[derive(Debug, Error)]
pub enum Pdf2QuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input was read but is not a PDF.
    #[error("Input is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A noise profile file could not be read or parsed.
    #[error("Failed to load noise profile '{path}': {detail}")]
    NoiseProfileUnreadable { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which kind of block arrived while no question was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanKind {
    Option,
    Image,
}

/// A non-fatal anomaly recorded while parsing.
///
/// Every diagnostic is also logged at `WARN` when it is recorded. The `page`
/// fields are 0-based indices; messages print 1-based page numbers.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An image could not be decoded or hashed; it was kept (or skipped by
    /// the source when its pixels were unreadable) and parsing continued.
    #[error("Page {}: malformed block ignored: {}", .page + 1, .detail)]
    MalformedBlockIgnored { page: usize, detail: String },

    /// An option line or image arrived before any question start.
    #[error("Page {}: {:?} block outside any question was discarded", .page + 1, .block)]
    OrphanOptionOrImage { page: usize, block: OrphanKind },

    /// A second, different correctness marker was seen for one question.
    /// The later one wins.
    #[error("Q.{question}: correct answer changed from {previous} to {chosen}")]
    AmbiguousCorrectMarker {
        question: u32,
        previous: Letter,
        chosen: Letter,
    },

    /// A question was finalized without any body text.
    #[error("Q.{question}: question has no body text")]
    EmptyQuestionBody { question: u32 },

    /// An image fell outside the vertical window of the open question.
    #[error("Page {}: image at y={} outside the window of Q.{}", .page + 1, .y, .question)]
    ImageOutsideWindow { page: usize, question: u32, y: f32 },

    /// A page's text or objects could not be read; other pages continue.
    #[error("Page {}: unreadable: {}", .page + 1, .detail)]
    PageUnreadable { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_out_of_range_display() {
        let e = Pdf2QuizError::PageOutOfRange { page: 9, total: 4 };
        assert!(e.to_string().contains("Page 9"), "got: {e}");
        assert!(e.to_string().contains("4 pages"));
    }

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = Pdf2QuizError::NotAPdf {
            path: PathBuf::from("a.txt"),
            magic: b"GIF8".to_vec(),
        };
        assert!(e.to_string().contains("a.txt"));
    }

    #[test]
    fn ambiguous_marker_display() {
        let d = Diagnostic::AmbiguousCorrectMarker {
            question: 12,
            previous: Letter::A,
            chosen: Letter::C,
        };
        assert_eq!(d.to_string(), "Q.12: correct answer changed from A to C");
    }

    #[test]
    fn diagnostic_messages_use_one_based_pages() {
        let d = Diagnostic::PageUnreadable {
            page: 0,
            detail: "no text layer".into(),
        };
        assert_eq!(d.to_string(), "Page 1: unreadable: no text layer");

        let d = Diagnostic::ImageOutsideWindow {
            page: 2,
            question: 7,
            y: 40.0,
        };
        assert_eq!(d.to_string(), "Page 3: image at y=40 outside the window of Q.7");
    }

    #[test]
    fn diagnostics_serialise_with_kind_tag() {
        let d = Diagnostic::OrphanOptionOrImage {
            page: 0,
            block: OrphanKind::Image,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "orphan_option_or_image");
        assert_eq!(json["block"], "image");
    }
}
