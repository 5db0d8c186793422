//! # pdf2quiz
//!
//! Extract structured multiple-choice questions from exam-paper PDFs using
//! layout rules: no OCR, no model calls, the same input always gives the
//! same output.
//!
//! ## Why layout rules?
//!
//! Answer-key PDFs exported by online test platforms share a rigid visual
//! grammar: a `Section : …` heading, `Q.12` question starts, `A.`–`D.`
//! option rows with a tick (`☑`) or cross (`X`) in front, diagrams placed
//! under the question they illustrate, and the same banner and "Question
//! ID" footer on every page. Reading the text layer and positions with
//! pdfium and running that grammar as a small state machine is fast and
//! exact, and anomalies are reported instead of guessed away.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read file, check %PDF magic
//!  ├─ 2. Source    text segments + image objects via pdfium (spawn_blocking)
//!  ├─ 3. Layout    merge fragments into lines, order by (top, left)
//!  ├─ 4. Noise     drop junk lines, small images, banner look-alikes
//!  ├─ 5. Classify  Section > QuestionStart > Option > Continuation
//!  ├─ 6. Assemble  Idle/Open state machine, image window, diagnostics
//!  └─ 7. Output    questions + diagnostics + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2quiz::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract("paper.pdf", &config).await?;
//!     for q in &output.questions {
//!         println!("{}", q.flatten(&config.flatten_options()));
//!     }
//!     eprintln!("{} diagnostics", output.diagnostics.len());
//!     Ok(())
//! }
//! ```
//!
//! Blocks from another source (a different PDF library, a test fixture) can
//! be parsed without pdfium via [`parse_blocks`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2quiz = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BodySeparator, ExtractionConfig, ExtractionConfigBuilder, NoiseProfile, PageSelection,
    DEFAULT_JUNK_PATTERNS,
};
pub use error::{Diagnostic, OrphanKind, Pdf2QuizError};
pub use extract::{
    extract, extract_from_bytes, extract_sync, extract_to_file, fingerprint_images, inspect,
    ImageFingerprint,
};
pub use model::{BBox, BlockKind, BlockPayload, ContentBlock, FlattenOptions, ImageBlob, Letter, Question, SourcePage};
pub use output::{
    AnswerKeyEntry, DocumentMetadata, ExtractionOutput, ExtractionStats, SectionAnswers,
};
pub use pipeline::assemble::{parse_blocks, parse_pages, Assembler, ParseOutcome, QuestionSink};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, extract_stream_from_bytes, QuestionStream};
