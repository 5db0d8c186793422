//! Layout reconstruction: raw positioned fragments → ordered page blocks.
//!
//! pdfium reports text as segments, often several per visual line (a bold
//! `Q.12` followed by regular text, or a tick glyph in a symbol font before
//! the option letter). The classifier works on whole lines, so fragments
//! whose tops lie within `line_tolerance` points are merged left-to-right.
//! Lines and images are then sorted into reading order: top, then left.

use crate::model::{BBox, ContentBlock, SourcePage};

/// A positioned run of text as reported by the PDF backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BBox,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Merge fragments into visual lines.
///
/// Fragments are sorted by top, then each is appended to the current line
/// while its top stays within `tolerance` of the line's first fragment.
/// Whitespace-only fragments are dropped.
pub fn group_lines(mut fragments: Vec<TextFragment>, tolerance: f32) -> Vec<TextFragment> {
    fragments.retain(|f| !f.text.trim().is_empty());
    fragments.sort_by(|a, b| {
        a.bbox
            .top()
            .total_cmp(&b.bbox.top())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Vec<TextFragment>> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (fragment.bbox.top() - line[0].bbox.top()).abs() <= tolerance => {
                line.push(fragment)
            }
            _ => lines.push(vec![fragment]),
        }
    }

    lines.into_iter().map(join_line).collect()
}

fn join_line(mut parts: Vec<TextFragment>) -> TextFragment {
    parts.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    let bbox = parts
        .iter()
        .skip(1)
        .fold(parts[0].bbox, |acc, p| acc.union(&p.bbox));
    let text = parts
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    TextFragment { text, bbox }
}

/// Build one page in reading order from raw fragments and image blocks.
pub fn build_page(
    index: usize,
    height: f32,
    fragments: Vec<TextFragment>,
    images: Vec<ContentBlock>,
    line_tolerance: f32,
) -> SourcePage {
    let mut blocks: Vec<ContentBlock> = group_lines(fragments, line_tolerance)
        .into_iter()
        .map(|line| ContentBlock::text(index, line.bbox, line.text))
        .chain(images)
        .collect();
    // Stable: a text line and an image at the same position keep text first.
    blocks.sort_by(|a, b| {
        a.bbox
            .top()
            .total_cmp(&b.bbox.top())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    SourcePage::new(index, height, blocks)
}
