//! Block source: read positioned text and images out of a PDF via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Everything in this module is blocking; the async entry points move it onto
//! `tokio::task::spawn_blocking`.
//!
//! ## Coordinates
//!
//! pdfium reports bounds with a bottom-left origin. Blocks leave this module
//! with a top-left origin (`y0 = page_height - top`) so that "further down the
//! page" means "larger y" everywhere else in the crate.

use crate::config::PageSelection;
use crate::error::{Diagnostic, Pdf2QuizError};
use crate::model::{BBox, ContentBlock, SourcePage};
use crate::output::DocumentMetadata;
use crate::pipeline::encode::encode_image;
use crate::pipeline::layout::{build_page, TextFragment};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library.
///
/// Tried in order: `$PDFIUM_LIB_PATH`, the platform library name in the
/// working directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2QuizError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from {}={}", PDFIUM_LIB_PATH_ENV, path);
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2QuizError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document from memory, mapping load failures onto typed errors.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2QuizError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2QuizError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                Pdf2QuizError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            Pdf2QuizError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// What the source delivers for each selected page.
pub enum PageEvent {
    /// The page was read; `diagnostics` lists blocks skipped on the way.
    Page {
        page: SourcePage,
        diagnostics: Vec<Diagnostic>,
    },
    /// The page could not be read at all.
    Failed(Diagnostic),
}

/// Read the selected pages of a document.
///
/// `on_start` receives the number of selected pages once the document is
/// open; `on_page` is then called once per page in ascending page order.
/// Runs on the calling thread; wrap in `spawn_blocking` from async code.
pub fn read_pages_blocking(
    bytes: &[u8],
    path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    line_tolerance: f32,
    on_start: impl FnOnce(usize),
    mut on_page: impl FnMut(usize, PageEvent),
) -> Result<DocumentMetadata, Pdf2QuizError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, bytes, path, password)?;
    let metadata = read_metadata(&document);
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let page_indices = selection.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2QuizError::PageOutOfRange {
            page: selection.first_page(),
            total: total_pages,
        });
    }
    debug!("Selected {} pages for extraction", page_indices.len());
    on_start(page_indices.len());

    for idx in page_indices {
        let event = match pages.get(idx as u16) {
            Ok(page) => match read_page(&page, idx, line_tolerance) {
                Ok((page, diagnostics)) => PageEvent::Page { page, diagnostics },
                Err(detail) => PageEvent::Failed(Diagnostic::PageUnreadable { page: idx, detail }),
            },
            Err(e) => PageEvent::Failed(Diagnostic::PageUnreadable {
                page: idx,
                detail: format!("{:?}", e),
            }),
        };
        on_page(idx, event);
    }

    Ok(metadata)
}

/// Read one page's text lines and images into a [`SourcePage`].
fn read_page(
    page: &PdfPage,
    index: usize,
    line_tolerance: f32,
) -> Result<(SourcePage, Vec<Diagnostic>), String> {
    let height = page.height().value;
    let text = page.text().map_err(|e| format!("text layer: {:?}", e))?;

    let fragments: Vec<TextFragment> = text
        .segments()
        .iter()
        .map(|segment| {
            let bounds = segment.bounds();
            TextFragment::new(
                segment.text(),
                flip(
                    height,
                    bounds.left().value,
                    bounds.top().value,
                    bounds.right().value,
                    bounds.bottom().value,
                ),
            )
        })
        .collect();

    let mut images = Vec::new();
    let mut diagnostics = Vec::new();
    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        let bbox = match object.bounds() {
            Ok(b) => flip(
                height,
                b.left().value,
                b.top().value,
                b.right().value,
                b.bottom().value,
            ),
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedBlockIgnored {
                    page: index,
                    detail: format!("image bounds: {:?}", e),
                });
                continue;
            }
        };
        let blob = image_object
            .get_raw_image()
            .map_err(|e| format!("{:?}", e))
            .and_then(|img| encode_image(&img).map_err(|e| e.to_string()));
        match blob {
            Ok(blob) => images.push(ContentBlock::image(index, bbox, blob)),
            Err(detail) => diagnostics.push(Diagnostic::MalformedBlockIgnored {
                page: index,
                detail: format!("image pixels: {detail}"),
            }),
        }
    }

    debug!(
        "Read page {}: {} text fragments, {} images",
        index + 1,
        fragments.len(),
        images.len()
    );
    Ok((
        build_page(index, height, fragments, images, line_tolerance),
        diagnostics,
    ))
}

/// Convert bottom-left-origin bounds to a top-left-origin [`BBox`].
fn flip(page_height: f32, left: f32, top: f32, right: f32, bottom: f32) -> BBox {
    BBox::new(left, page_height - top, right, page_height - bottom)
}

/// Extract document metadata without reading page content.
pub fn read_metadata_blocking(
    bytes: &[u8],
    path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2QuizError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, bytes, path, password)?;
    Ok(read_metadata(&document))
}

fn read_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_moves_origin_to_top_left() {
        let bbox = flip(800.0, 50.0, 700.0, 150.0, 690.0);
        assert_eq!(bbox, BBox::new(50.0, 100.0, 150.0, 110.0));
        assert_eq!(bbox.top(), 100.0);
        assert_eq!(bbox.height(), 10.0);
    }
}
