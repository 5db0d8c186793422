//! Core data types: positioned content blocks in, question records out.
//!
//! Coordinates everywhere in this crate use a top-left origin with `y`
//! growing downwards, in PDF points. The pdfium source converts from the
//! PDF's native bottom-left origin before blocks reach the pipeline.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned bounding box `(x0, y0)`–`(x1, y1)`, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Vertical position used for ordering and image association.
    pub fn top(&self) -> f32 {
        self.y0
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// An encoded image attached to a question.
///
/// The bytes are reference-counted: cloning a blob (e.g. when it moves from
/// the source's page into a question) never copies pixel data.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ImageBlob {
    /// MIME type of `data`, `image/png` for everything the pdfium source emits.
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes, serialised as base64.
    #[serde(serialize_with = "serialize_base64")]
    pub data: Arc<[u8]>,
}

impl ImageBlob {
    pub fn new(mime_type: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            width,
            height,
            data: Arc::from(data),
        }
    }

    /// The blob as a `data:` URI, convenient for HTML or notebook viewers.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn serialize_base64<S: Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

// ── Content blocks ───────────────────────────────────────────────────────

/// Discriminant of a [`ContentBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// What a block carries.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPayload {
    Text(String),
    Image(ImageBlob),
}

/// One unit of extracted page content: a reconstructed text line or an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    /// 0-based page index.
    pub page: usize,
    pub bbox: BBox,
    pub payload: BlockPayload,
}

impl ContentBlock {
    pub fn text(page: usize, bbox: BBox, text: impl Into<String>) -> Self {
        Self {
            page,
            bbox,
            payload: BlockPayload::Text(text.into()),
        }
    }

    pub fn image(page: usize, bbox: BBox, image: ImageBlob) -> Self {
        Self {
            page,
            bbox,
            payload: BlockPayload::Image(image),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self.payload {
            BlockPayload::Text(_) => BlockKind::Text,
            BlockPayload::Image(_) => BlockKind::Image,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            BlockPayload::Text(s) => Some(s),
            BlockPayload::Image(_) => None,
        }
    }
}

/// All blocks of one page, in reading order.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// 0-based page index.
    pub index: usize,
    /// Page height in points; the lower bound of the last image window.
    /// `f32::INFINITY` when unknown.
    pub height: f32,
    pub blocks: Vec<ContentBlock>,
}

impl SourcePage {
    pub fn new(index: usize, height: f32, blocks: Vec<ContentBlock>) -> Self {
        Self {
            index,
            height,
            blocks,
        }
    }

    /// Group an already ordered block sequence into pages.
    ///
    /// A new page starts whenever the `page` field changes, so the relative
    /// order of blocks is never altered. Page heights are unknown.
    pub fn group(blocks: impl IntoIterator<Item = ContentBlock>) -> Vec<SourcePage> {
        let mut pages: Vec<SourcePage> = Vec::new();
        for block in blocks {
            match pages.last_mut() {
                Some(page) if page.index == block.page => page.blocks.push(block),
                _ => pages.push(SourcePage::new(block.page, f32::INFINITY, vec![block])),
            }
        }
        pages
    }
}

// ── Questions ────────────────────────────────────────────────────────────

/// Multiple-choice option letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    pub const ALL: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

    /// Parse a single option letter, case-insensitively.
    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
            Letter::D => 'D',
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A finalized question record.
///
/// Produced only by the assembler; fields are public for reading but a
/// question is never mutated after it has been emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    /// Number as printed in the source. Not guaranteed to be unique or
    /// monotonic across the document.
    pub number: u32,
    pub text: String,
    /// At most one entry per letter, iterated in A–D order.
    pub options: BTreeMap<Letter, String>,
    pub correct: Option<Letter>,
    /// Attached diagrams in page/vertical order.
    pub images: Vec<ImageBlob>,
    pub section: String,
    /// 0-based page on which the question started.
    pub page: usize,
}

/// Separators used by [`Question::flatten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Placed between the body and the first option.
    pub body_separator: String,
    /// Placed between consecutive options.
    pub option_separator: String,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            body_separator: " | ".to_string(),
            option_separator: " | ".to_string(),
        }
    }
}

impl Question {
    /// Text of the option marked correct, if any.
    pub fn correct_text(&self) -> Option<&str> {
        self.correct
            .and_then(|letter| self.options.get(&letter))
            .map(String::as_str)
    }

    /// One-line plain-text form: `Q.<n> body<sep>A. text<sep>B. text`.
    pub fn flatten(&self, opts: &FlattenOptions) -> String {
        let mut out = format!("Q.{} {}", self.number, self.text);
        for (i, (letter, text)) in self.options.iter().enumerate() {
            out.push_str(if i == 0 {
                &opts.body_separator
            } else {
                &opts.option_separator
            });
            out.push_str(&format!("{letter}. {text}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q() -> Question {
        let mut options = BTreeMap::new();
        options.insert(Letter::B, "Dog".to_string());
        options.insert(Letter::A, "Cat".to_string());
        Question {
            number: 7,
            text: "Pick one.".into(),
            options,
            correct: Some(Letter::B),
            images: vec![],
            section: "Reasoning".into(),
            page: 0,
        }
    }

    #[test]
    fn letter_parsing_is_case_insensitive() {
        assert_eq!(Letter::from_char('c'), Some(Letter::C));
        assert_eq!(Letter::from_char('D'), Some(Letter::D));
        assert_eq!(Letter::from_char('E'), None);
    }

    #[test]
    fn flatten_orders_options_by_letter() {
        let opts = FlattenOptions {
            body_separator: " :: ".into(),
            option_separator: "; ".into(),
        };
        assert_eq!(q().flatten(&opts), "Q.7 Pick one. :: A. Cat; B. Dog");
        assert_eq!(q().correct_text(), Some("Dog"));
    }

    #[test]
    fn question_serialises_letters_as_strings() {
        let json = serde_json::to_value(q()).unwrap();
        assert_eq!(json["correct"], "B");
        assert_eq!(json["options"]["A"], "Cat");
    }

    #[test]
    fn image_blob_serialises_as_base64() {
        let blob = ImageBlob::new("image/png", 1, 1, vec![1, 2, 3]);
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["data"], "AQID");
        assert_eq!(blob.to_data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn group_splits_on_page_change_only() {
        let b = |page| ContentBlock::text(page, BBox::default(), "x");
        let pages = SourcePage::group(vec![b(0), b(0), b(1), b(0)]);
        let sizes: Vec<(usize, usize)> = pages.iter().map(|p| (p.index, p.blocks.len())).collect();
        assert_eq!(sizes, vec![(0, 2), (1, 1), (0, 1)]);
    }
}
