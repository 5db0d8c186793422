//! Eager (full-document) extraction entry points.
//!
//! These wait for every selected page, then return one [`ExtractionOutput`].
//! Use [`crate::stream::extract_stream`] instead when questions should be
//! consumed as they are finalized.

use crate::config::ExtractionConfig;
use crate::error::{Diagnostic, Pdf2QuizError};
use crate::model::{BBox, BlockPayload};
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats};
use crate::pipeline::assemble::{Assembler, AssemblyCounters, QuestionSink};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::noise::fingerprint;
use crate::pipeline::source::{self, PageEvent};
use serde::Serialize;
use std::cell::Cell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract questions from a PDF file.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the document could be opened, even if
/// some pages were unreadable or no question was found (check
/// `output.diagnostics` and `output.stats`).
///
/// # Errors
/// Returns `Err(Pdf2QuizError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Encrypted without (or with a wrong) password
/// - pdfium could not be loaded
/// - Invalid configuration or an empty page selection
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2QuizError> {
    config.validate()?;
    info!("Starting extraction: {}", path.as_ref().display());
    let resolved = input::resolve_input(path).await?;
    run(resolved, config.clone()).await
}

/// Extract questions from PDF bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use pdf2quiz::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("paper.pdf")?;
/// let output = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// println!("{} questions", output.questions.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2QuizError> {
    config.validate()?;
    let resolved = input::from_bytes(PathBuf::from("<memory>"), bytes.to_vec())?;
    run(resolved, config.clone()).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally; must not be called from
/// inside an async context.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(path, config))
}

/// Extract and write the output as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, Pdf2QuizError> {
    let output = extract(path, config).await?;
    let json = serde_json::to_vec_pretty(&output)
        .map_err(|e| Pdf2QuizError::Internal(format!("JSON serialisation: {e}")))?;
    write_atomic(output_path.as_ref(), &json).await?;
    Ok(output.stats)
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2QuizError> {
    let write_err = |source| Pdf2QuizError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await.map_err(write_err)?;

    let path_buf = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || {
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path_buf).map_err(|e| e.error)?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|e| Pdf2QuizError::Internal(format!("Write task panicked: {e}")))?
    .map_err(write_err)
}

/// Read PDF metadata without parsing any page content.
pub async fn inspect(
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2QuizError> {
    let resolved = input::resolve_input(path).await?;
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        source::read_metadata_blocking(&resolved.bytes, &resolved.path, password.as_deref())
    })
    .await
    .map_err(|e| Pdf2QuizError::Internal(format!("Metadata task panicked: {e}")))?
}

/// Perceptual hash of one image found in a document.
#[derive(Debug, Clone, Serialize)]
pub struct ImageFingerprint {
    /// 0-based page index.
    pub page: usize,
    pub bbox: BBox,
    pub width: u32,
    pub height: u32,
    /// Base64 hash, usable as an unwanted-image hash. `None` when the image
    /// could not be decoded.
    pub hash: Option<String>,
    pub error: Option<String>,
}

/// Hash every image on the selected pages that passes the area check.
///
/// Used to build noise profiles: run once over a sample paper, pick the
/// banner's hash, add it to `unwanted_image_hashes`. No image is filtered.
pub async fn fingerprint_images(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Vec<ImageFingerprint>, Pdf2QuizError> {
    config.validate()?;
    let resolved = input::resolve_input(path).await?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let mut found = Vec::new();
        source::read_pages_blocking(
            &resolved.bytes,
            &resolved.path,
            config.password.as_deref(),
            &config.pages,
            config.line_tolerance,
            |_| {},
            |_, event| {
                let PageEvent::Page { page, .. } = event else {
                    return;
                };
                for block in page.blocks {
                    if block.bbox.area() < config.min_image_area {
                        continue;
                    }
                    if let BlockPayload::Image(image) = &block.payload {
                        let (hash, error) = match fingerprint(image) {
                            Ok(h) => (Some(h), None),
                            Err(e) => (None, Some(e)),
                        };
                        found.push(ImageFingerprint {
                            page: block.page,
                            bbox: block.bbox,
                            width: image.width,
                            height: image.height,
                            hash,
                            error,
                        });
                    }
                }
            },
        )?;
        Ok::<_, Pdf2QuizError>(found)
    })
    .await
    .map_err(|e| Pdf2QuizError::Internal(format!("Fingerprint task panicked: {e}")))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    resolved: ResolvedInput,
    config: ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2QuizError> {
    tokio::task::spawn_blocking(move || run_blocking(&resolved, &config))
        .await
        .map_err(|e| Pdf2QuizError::Internal(format!("Extraction task panicked: {e}")))?
}

fn run_blocking(
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2QuizError> {
    let start = Instant::now();
    let driven = drive(resolved, config, Vec::new())?;
    let questions = driven.sink;

    let stats = ExtractionStats {
        total_pages: driven.metadata.page_count,
        processed_pages: driven.processed_pages,
        failed_pages: driven.failed_pages,
        blocks_seen: driven.counters.blocks_seen,
        blocks_filtered: driven.counters.blocks_filtered,
        images_attached: driven.counters.images_attached,
        orphan_lines: driven.counters.orphan_lines,
        questions: questions.len(),
        unanswered: questions.iter().filter(|q| q.correct.is_none()).count(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} questions from {}/{} pages, {} diagnostics, {}ms",
        stats.questions,
        stats.processed_pages,
        stats.total_pages,
        driven.diagnostics.len(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        questions,
        diagnostics: driven.diagnostics,
        metadata: driven.metadata,
        stats,
    })
}

/// What one pass over a document left behind.
pub(crate) struct Driven<S> {
    pub sink: S,
    pub diagnostics: Vec<Diagnostic>,
    pub counters: AssemblyCounters,
    pub metadata: DocumentMetadata,
    pub processed_pages: usize,
    pub failed_pages: usize,
}

/// Walk the selected pages through one assembler, firing progress events.
///
/// Shared by the eager and streaming APIs; blocking.
pub(crate) fn drive<S: QuestionSink>(
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
    sink: S,
) -> Result<Driven<S>, Pdf2QuizError> {
    let mut assembler = Assembler::with_sink(config, sink)?;
    let callback = config.progress_callback.as_ref();
    let selected = Cell::new(0usize);
    let mut processed_pages = 0usize;
    let mut failed_pages = 0usize;

    let metadata = source::read_pages_blocking(
        &resolved.bytes,
        &resolved.path,
        config.password.as_deref(),
        &config.pages,
        config.line_tolerance,
        |total| {
            selected.set(total);
            if let Some(cb) = callback {
                cb.on_extraction_start(total);
            }
        },
        |idx, event| {
            let page_num = idx + 1;
            let selected = selected.get();
            if let Some(cb) = callback {
                cb.on_page_start(page_num, selected);
            }
            match event {
                PageEvent::Page { page, diagnostics } => {
                    for d in diagnostics {
                        assembler.record(d);
                    }
                    assembler.feed_page(page);
                    processed_pages += 1;
                    debug!(
                        "Page {} done, {} questions so far",
                        page_num,
                        assembler.counters().questions
                    );
                    if let Some(cb) = callback {
                        cb.on_page_complete(page_num, selected, assembler.counters().questions);
                    }
                }
                PageEvent::Failed(diagnostic) => {
                    warn!("Page {} unreadable", page_num);
                    let message = diagnostic.to_string();
                    assembler.record(diagnostic);
                    failed_pages += 1;
                    if let Some(cb) = callback {
                        cb.on_page_error(page_num, selected, &message);
                    }
                }
            }
        },
    )?;

    let (sink, diagnostics, counters) = assembler.finish_into_parts();
    if let Some(cb) = callback {
        cb.on_extraction_complete(selected.get(), counters.questions);
    }

    Ok(Driven {
        sink,
        diagnostics,
        counters,
        metadata,
        processed_pages,
        failed_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_pdf_bytes_are_rejected_before_pdfium() {
        let err = extract_from_bytes(b"hello world", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2QuizError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_first() {
        let mut config = ExtractionConfig::default();
        config.similarity_threshold = 65;
        let err = extract_from_bytes(b"%PDF-1.7", &config).await.unwrap_err();
        assert!(matches!(err, Pdf2QuizError::InvalidConfig(_)));
    }

    #[test]
    fn sync_missing_file() {
        let err = extract_sync("/no/such/paper.pdf", &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, Pdf2QuizError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.json");
        write_atomic(&target, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
    }
}
