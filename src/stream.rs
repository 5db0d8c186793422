//! Streaming extraction API: emit questions as they are finalized.
//!
//! A question is final the moment the next question start, section heading
//! or end of document is seen, so callers can write records to disk or a
//! database while later pages are still being read.
//!
//! Questions arrive in document order. Diagnostics are not part of the
//! stream; they are logged at `WARN` as they occur. Use
//! [`crate::extract::extract`] when you need them as data.

use crate::config::ExtractionConfig;
use crate::error::Pdf2QuizError;
use crate::extract::drive;
use crate::model::Question;
use crate::pipeline::input::{self, ResolvedInput};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of finalized questions.
///
/// A fatal error discovered after the stream was created (e.g. a wrong
/// password) arrives as the last item.
pub type QuestionStream = Pin<Box<dyn Stream<Item = Result<Question, Pdf2QuizError>> + Send>>;

/// Buffered questions between the blocking reader and the consumer.
const CHANNEL_CAPACITY: usize = 32;

/// Extract questions from a PDF file, streaming each one as it is finalized.
///
/// # Returns
/// - `Ok(QuestionStream)` — a stream of `Result<Question, Pdf2QuizError>`
/// - `Err(Pdf2QuizError)` — fatal error found before reading started
///   (file not found, not a PDF, invalid configuration)
///
/// # Example
/// ```rust,no_run
/// use pdf2quiz::{extract_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut stream = extract_stream("paper.pdf", &ExtractionConfig::default()).await?;
/// while let Some(question) = stream.next().await {
///     let q = question?;
///     println!("Q.{} [{}] {}", q.number, q.section, q.text);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_stream(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<QuestionStream, Pdf2QuizError> {
    config.validate()?;
    info!("Starting streaming extraction: {}", path.as_ref().display());
    let resolved = input::resolve_input(path).await?;
    Ok(spawn_reader(resolved, config.clone()))
}

/// Streaming equivalent of [`crate::extract::extract_from_bytes`].
pub async fn extract_stream_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<QuestionStream, Pdf2QuizError> {
    config.validate()?;
    let resolved = input::from_bytes(PathBuf::from("<memory>"), bytes.to_vec())?;
    Ok(spawn_reader(resolved, config.clone()))
}

fn spawn_reader(resolved: ResolvedInput, config: ExtractionConfig) -> QuestionStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let sink_tx = tx.clone();
        // A send only fails once the consumer dropped the stream; the rest of
        // the document is still read so progress callbacks complete.
        let sink = move |q: Question| {
            let _ = sink_tx.blocking_send(Ok(q));
        };
        match drive(&resolved, &config, sink) {
            Ok(driven) => debug!(
                "Stream finished: {} questions, {} diagnostics",
                driven.counters.questions,
                driven.diagnostics.len()
            ),
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_rejects_non_pdf_up_front() {
        let result = extract_stream_from_bytes(b"<html>", &ExtractionConfig::default()).await;
        assert!(matches!(result, Err(Pdf2QuizError::NotAPdf { .. })));
    }

    #[tokio::test]
    async fn stream_rejects_missing_file() {
        let result = extract_stream("/no/such/file.pdf", &ExtractionConfig::default()).await;
        assert!(matches!(result, Err(Pdf2QuizError::FileNotFound { .. })));
    }
}
