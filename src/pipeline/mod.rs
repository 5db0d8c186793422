//! Pipeline stages for exam-PDF question extraction.
//!
//! Each submodule implements exactly one transformation step. Only
//! [`source`] touches pdfium; everything after it works on plain
//! [`crate::model::ContentBlock`]s and is testable without a PDF.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ layout ──▶ noise ──▶ classify ──▶ assemble ──▶ postprocess
//! (path)    (pdfium)   (lines)    (junk)    (rules)      (state)      (body clean-up)
//!              │
//!              └─▶ encode (image → PNG blob)
//! ```
//!
//! 1. [`input`]    — read the file and check the `%PDF` magic bytes
//! 2. [`source`]   — pull text segments and image objects per page; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]   — re-encode every extracted image as PNG
//! 4. [`layout`]   — merge fragments into lines, order lines and images
//! 5. [`noise`]    — drop junk text and unwanted images
//! 6. [`classify`] — label each line (section, question, option, …)
//! 7. [`assemble`] — the Idle/Open state machine that builds questions
//! 8. [`postprocess`] — whitespace and invisible-character rules

pub mod assemble;
pub mod classify;
pub mod encode;
pub mod input;
pub mod layout;
pub mod noise;
pub mod postprocess;
pub mod source;
