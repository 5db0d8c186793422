//! Input resolution: read a local path into memory and check it is a PDF.
//!
//! pdfium opens documents from a byte slice here, so the whole file is read
//! once up front. The `%PDF` magic check runs before pdfium sees the bytes so
//! callers get a meaningful error rather than a generic load failure.

use crate::error::Pdf2QuizError;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF document held in memory together with the path it came from.
///
/// `path` is only used in error messages; for in-memory input it is a
/// placeholder such as `<memory>`.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a local file, validating existence, permissions and PDF magic bytes.
pub async fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, Pdf2QuizError> {
    let path = path.as_ref().to_path_buf();
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2QuizError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2QuizError::FileNotFound { path }),
    };
    let input = from_bytes(path, bytes)?;
    debug!("Resolved local PDF: {} ({} bytes)", input.path.display(), input.bytes.len());
    Ok(input)
}

/// Wrap bytes already in memory, validating the PDF magic bytes.
pub fn from_bytes(path: PathBuf, bytes: Vec<u8>) -> Result<ResolvedInput, Pdf2QuizError> {
    check_magic(&path, &bytes)?;
    Ok(ResolvedInput { path, bytes })
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2QuizError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    Err(Pdf2QuizError::NotAPdf {
        path: path.to_path_buf(),
        magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
    })
}
