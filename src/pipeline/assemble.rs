//! Question assembly: the state machine that turns classified blocks into
//! finalized [`Question`] records.
//!
//! ```text
//!            Section / QuestionStart / Option / Continuation / Image
//!   ┌──────┐ ─────────────── QuestionStart ───────────────▶ ┌──────┐
//!   │ Idle │                                                 │ Open │ ◀─┐ Option, Continuation,
//!   └──────┘ ◀──────── Section (finalize) / finish ───────── └──────┘ ──┘ Image, QuestionStart
//! ```
//!
//! * `Section` finalizes any open question, then switches the current section.
//! * `QuestionStart` finalizes any open question, then opens a new one that
//!   captures the current section by value.
//! * `Option`, `Continuation` and images only mutate an open question; while
//!   idle they are discarded.
//! * [`Assembler::finish`] finalizes the last open question.
//!
//! The assembler owns every piece of parse state, so two documents never
//! share a cursor. It is fed page by page; within a page, blocks must
//! already be in reading order.

use crate::config::{BodySeparator, ExtractionConfig};
use crate::error::{Diagnostic, OrphanKind, Pdf2QuizError};
use crate::model::{BlockPayload, ContentBlock, ImageBlob, Letter, Question, SourcePage};
use crate::pipeline::classify::{classify, LineClass};
use crate::pipeline::noise::{FilterVerdict, NoiseFilter};
use crate::pipeline::postprocess::{clean_body, clean_line};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ── Collector ────────────────────────────────────────────────────────────

/// Receives each question the moment it is finalized.
///
/// `Vec<Question>` collects in memory; any `FnMut(Question)` works too, which
/// is how the streaming API forwards questions to a channel.
pub trait QuestionSink {
    fn accept(&mut self, question: Question);
}

impl QuestionSink for Vec<Question> {
    fn accept(&mut self, question: Question) {
        self.push(question);
    }
}

impl<F: FnMut(Question)> QuestionSink for F {
    fn accept(&mut self, question: Question) {
        self(question)
    }
}

// ── Counters ─────────────────────────────────────────────────────────────

/// Per-run block counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyCounters {
    pub blocks_seen: usize,
    pub blocks_filtered: usize,
    pub images_attached: usize,
    /// Continuation lines seen while no question was open (cover pages,
    /// instructions). Not worth a diagnostic each.
    pub orphan_lines: usize,
    pub questions: usize,
}

// ── Draft ────────────────────────────────────────────────────────────────

/// The one question under construction.
#[derive(Debug)]
struct Draft {
    number: u32,
    body: Vec<String>,
    options: BTreeMap<Letter, String>,
    correct: Option<Letter>,
    images: Vec<ImageBlob>,
    section: String,
    page: usize,
}

impl Draft {
    fn finalize(self, separator: BodySeparator) -> Question {
        let text = clean_body(
            &self.body.join(separator.as_str()),
            separator == BodySeparator::Newline,
        );
        Question {
            number: self.number,
            text,
            options: self.options,
            correct: self.correct,
            images: self.images,
            section: self.section,
            page: self.page,
        }
    }
}

// ── Image window ─────────────────────────────────────────────────────────

/// Page-local vertical cursor used to decide whether an image belongs to
/// the open question.
///
/// An image at `y` is admitted when `cursor < y <= limit`, where `cursor` is
/// the top of the last kept text block on the page and `limit` is the top of
/// the next one (or the page bottom). Images never move the cursor, so a row
/// of figures sharing a top edge all land on the same question.
#[derive(Debug, Clone, Copy)]
struct ImageWindow {
    cursor: f32,
}

impl ImageWindow {
    fn reset(&mut self, page_top: f32) {
        self.cursor = page_top;
    }

    fn admits(&self, y: f32, limit: f32) -> bool {
        self.cursor < y && y <= limit
    }

    fn advance(&mut self, y: f32) {
        if y > self.cursor {
            self.cursor = y;
        }
    }
}

// ── Assembler ────────────────────────────────────────────────────────────

/// Result of a completed parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub questions: Vec<Question>,
    pub diagnostics: Vec<Diagnostic>,
    pub counters: AssemblyCounters,
}

/// Reduction state for one document.
pub struct Assembler<S: QuestionSink = Vec<Question>> {
    filter: NoiseFilter,
    separator: BodySeparator,
    section: String,
    open: Option<Draft>,
    window: ImageWindow,
    sink: S,
    diagnostics: Vec<Diagnostic>,
    counters: AssemblyCounters,
}

impl Assembler<Vec<Question>> {
    /// Assembler that collects questions in memory.
    pub fn new(config: &ExtractionConfig) -> Result<Self, Pdf2QuizError> {
        Self::with_sink(config, Vec::new())
    }

    /// Finalize the last question and return everything collected.
    pub fn finish(mut self) -> ParseOutcome {
        self.close();
        ParseOutcome {
            questions: self.sink,
            diagnostics: self.diagnostics,
            counters: self.counters,
        }
    }
}

impl<S: QuestionSink> Assembler<S> {
    pub fn with_sink(config: &ExtractionConfig, sink: S) -> Result<Self, Pdf2QuizError> {
        config.validate()?;
        Ok(Self {
            filter: NoiseFilter::new(config)?,
            separator: config.body_separator,
            section: config.fallback_section.clone(),
            open: None,
            window: ImageWindow { cursor: 0.0 },
            sink,
            diagnostics: Vec::new(),
            counters: AssemblyCounters::default(),
        })
    }

    /// Finalize the last question and hand back the sink with the
    /// diagnostics and counters.
    pub fn finish_into_parts(mut self) -> (S, Vec<Diagnostic>, AssemblyCounters) {
        self.close();
        (self.sink, self.diagnostics, self.counters)
    }

    pub fn current_section(&self) -> &str {
        &self.section
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn counters(&self) -> AssemblyCounters {
        self.counters
    }

    /// Record an anomaly found outside the assembler (e.g. by the source).
    pub fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Feed one page. The open question, if any, carries over to the next page.
    pub fn feed_page(&mut self, page: SourcePage) {
        self.window.reset(0.0);

        // Noise goes first so filtered blocks neither mutate state nor move
        // the image cursor.
        let mut kept: Vec<ContentBlock> = Vec::with_capacity(page.blocks.len());
        for mut block in page.blocks {
            self.counters.blocks_seen += 1;
            if let BlockPayload::Text(text) = &mut block.payload {
                *text = clean_line(text);
            }
            match self.filter.check(&block) {
                FilterVerdict::Keep => kept.push(block),
                FilterVerdict::KeepUnhashable { detail } => {
                    self.record(Diagnostic::MalformedBlockIgnored {
                        page: block.page,
                        detail,
                    });
                    kept.push(block);
                }
                verdict => {
                    debug!(page = block.page, ?verdict, "block filtered");
                    self.counters.blocks_filtered += 1;
                }
            }
        }

        for i in 0..kept.len() {
            let limit = kept[i + 1..]
                .iter()
                .find(|b| b.as_text().is_some())
                .map(|b| b.bbox.top())
                .unwrap_or(page.height);
            let block = &kept[i];
            match &block.payload {
                BlockPayload::Text(text) => {
                    self.apply(classify(text), block.page);
                    self.window.advance(block.bbox.top());
                }
                BlockPayload::Image(image) => {
                    self.attach_image(image, block.page, block.bbox.top(), limit)
                }
            }
        }
    }

    /// Apply one classified line.
    fn apply(&mut self, class: LineClass, page: usize) {
        match class {
            LineClass::Section(label) => {
                self.close();
                debug!(section = %label, "section");
                self.section = label;
            }
            LineClass::QuestionStart { number, lead } => {
                self.close();
                self.open = Some(Draft {
                    number,
                    body: if lead.is_empty() { vec![] } else { vec![lead] },
                    options: BTreeMap::new(),
                    correct: None,
                    images: Vec::new(),
                    section: self.section.clone(),
                    page,
                });
            }
            LineClass::Option {
                letter,
                text,
                correct,
            } => match self.open.as_mut() {
                Some(draft) => {
                    if let Some(previous) = draft.options.insert(letter, text) {
                        debug!(question = draft.number, %letter, %previous, "option overwritten");
                    }
                    if correct {
                        let number = draft.number;
                        match draft.correct.replace(letter) {
                            Some(previous) if previous != letter => {
                                self.record(Diagnostic::AmbiguousCorrectMarker {
                                    question: number,
                                    previous,
                                    chosen: letter,
                                })
                            }
                            _ => {}
                        }
                    }
                }
                None => self.record(Diagnostic::OrphanOptionOrImage {
                    page,
                    block: OrphanKind::Option,
                }),
            },
            LineClass::Continuation(text) => match self.open.as_mut() {
                Some(draft) => draft.body.push(text),
                None => self.counters.orphan_lines += 1,
            },
            LineClass::Discard => {}
        }
    }

    fn attach_image(&mut self, image: &ImageBlob, page: usize, y: f32, limit: f32) {
        let Some(number) = self.open.as_ref().map(|d| d.number) else {
            self.record(Diagnostic::OrphanOptionOrImage {
                page,
                block: OrphanKind::Image,
            });
            return;
        };
        if !self.window.admits(y, limit) {
            self.record(Diagnostic::ImageOutsideWindow {
                page,
                question: number,
                y,
            });
            return;
        }
        if let Some(draft) = self.open.as_mut() {
            draft.images.push(image.clone());
            self.counters.images_attached += 1;
        }
    }

    /// Finalize the open question, if any, and push it to the sink.
    fn close(&mut self) {
        let Some(draft) = self.open.take() else {
            return;
        };
        let question = draft.finalize(self.separator);
        if question.text.is_empty() {
            self.record(Diagnostic::EmptyQuestionBody {
                question: question.number,
            });
        }
        debug!(
            number = question.number,
            options = question.options.len(),
            images = question.images.len(),
            "question finalized"
        );
        self.counters.questions += 1;
        self.sink.accept(question);
    }
}

/// Parse an ordered block sequence in one call.
///
/// Blocks are grouped into pages wherever their `page` index changes; page
/// heights are unknown, so the last image window on each page is open-ended.
pub fn parse_blocks(
    blocks: impl IntoIterator<Item = ContentBlock>,
    config: &ExtractionConfig,
) -> Result<ParseOutcome, Pdf2QuizError> {
    parse_pages(SourcePage::group(blocks), config)
}

/// Parse pages that are already materialised.
pub fn parse_pages(
    pages: impl IntoIterator<Item = SourcePage>,
    config: &ExtractionConfig,
) -> Result<ParseOutcome, Pdf2QuizError> {
    let mut assembler = Assembler::new(config)?;
    for page in pages {
        assembler.feed_page(page);
    }
    Ok(assembler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn text(y: f32, s: &str) -> ContentBlock {
        ContentBlock::text(0, BBox::new(10.0, y, 400.0, y + 10.0), s)
    }

    fn image(y: f32) -> ContentBlock {
        let blob = ImageBlob::new("image/png", 1, 1, vec![0x89, b'P', b'N', b'G']);
        ContentBlock::image(0, BBox::new(10.0, y, 210.0, y + 100.0), blob)
    }

    fn parse(blocks: Vec<ContentBlock>) -> ParseOutcome {
        parse_blocks(blocks, &ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn idle_options_and_images_are_orphans() {
        let out = parse(vec![text(10.0, "B. stray"), image(30.0)]);
        assert!(out.questions.is_empty());
        assert_eq!(
            out.diagnostics,
            vec![
                Diagnostic::OrphanOptionOrImage {
                    page: 0,
                    block: OrphanKind::Option
                },
                Diagnostic::OrphanOptionOrImage {
                    page: 0,
                    block: OrphanKind::Image
                },
            ]
        );
    }

    #[test]
    fn idle_continuation_is_counted_not_reported() {
        let out = parse(vec![text(10.0, "Read the instructions carefully")]);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.counters.orphan_lines, 1);
    }

    #[test]
    fn section_closes_open_question() {
        let out = parse(vec![
            text(10.0, "Q.1 First"),
            text(20.0, "Section : Maths"),
            text(30.0, "continues nothing"),
            text(40.0, "Q.2 Second"),
        ]);
        assert_eq!(out.questions.len(), 2);
        assert_eq!(out.questions[0].text, "First");
        assert_eq!(out.questions[0].section, "General");
        assert_eq!(out.questions[1].section, "Maths");
    }

    #[test]
    fn repeated_letter_overwrites_text_and_keeps_mark() {
        let out = parse(vec![
            text(10.0, "Q.4 Pick"),
            text(20.0, "☑ A. first"),
            text(30.0, "A. second"),
        ]);
        let q = &out.questions[0];
        assert_eq!(q.options.len(), 1);
        assert_eq!(q.options[&Letter::A], "second");
        assert_eq!(q.correct, Some(Letter::A));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn empty_body_is_kept_with_warning() {
        let out = parse(vec![text(10.0, "Q.9"), text(20.0, "A. yes")]);
        assert_eq!(out.questions.len(), 1);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::EmptyQuestionBody { question: 9 }]
        );
    }

    #[test]
    fn newline_separator_preserves_lines() {
        let config = ExtractionConfig::builder()
            .body_separator(BodySeparator::Newline)
            .build()
            .unwrap();
        let out = parse_blocks(
            vec![text(10.0, "Q.1 Statement I"), text(20.0, "Statement   II")],
            &config,
        )
        .unwrap();
        assert_eq!(out.questions[0].text, "Statement I\nStatement II");
    }

    #[test]
    fn image_above_cursor_is_outside_window() {
        // Image sits level with the option line already consumed.
        let out = parse(vec![text(10.0, "Q.1 Look"), text(50.0, "A. x"), image(50.0)]);
        assert!(out.questions[0].images.is_empty());
        assert!(matches!(
            out.diagnostics[0],
            Diagnostic::ImageOutsideWindow { question: 1, .. }
        ));
    }

    fn image_at(page: usize, x: f32, y: f32) -> ContentBlock {
        let blob = ImageBlob::new("image/png", 1, 1, vec![0x89, b'P', b'N', b'G']);
        ContentBlock::image(page, BBox::new(x, y, x + 90.0, y + 90.0), blob)
    }

    #[test]
    fn figures_in_a_row_all_attach() {
        let out = parse(vec![
            text(10.0, "Q.1 Which figure comes next?"),
            image_at(0, 40.0, 40.0),
            image_at(0, 140.0, 40.0),
            image_at(0, 240.0, 40.0),
            text(140.0, "A. 1"),
        ]);
        assert_eq!(out.questions[0].images.len(), 3);
        assert_eq!(out.counters.images_attached, 3);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn image_past_next_text_top_is_outside_window() {
        // Handed over out of reading order: the image sits below the option
        // line that follows it in the sequence.
        let out = parse(vec![text(10.0, "Q.1 Look"), image(200.0), text(100.0, "A. x")]);
        assert!(out.questions[0].images.is_empty());
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::ImageOutsideWindow {
                page: 0,
                question: 1,
                y: 200.0
            }]
        );
    }

    #[test]
    fn image_below_page_height_is_outside_window() {
        let pages = vec![SourcePage::new(
            0,
            300.0,
            vec![text(10.0, "Q.1 Look"), image(120.0), image(350.0)],
        )];
        let out = parse_pages(pages, &ExtractionConfig::default()).unwrap();
        assert_eq!(out.questions[0].images.len(), 1);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::ImageOutsideWindow {
                page: 0,
                question: 1,
                y: 350.0
            }]
        );
    }

    #[test]
    fn cursor_resets_at_each_page_top() {
        let pages = vec![
            SourcePage::new(0, 800.0, vec![text(10.0, "Q.1 Starts"), text(700.0, "A. late")]),
            SourcePage::new(1, 800.0, vec![image_at(1, 40.0, 20.0), text(300.0, "B. next")]),
        ];
        let out = parse_pages(pages, &ExtractionConfig::default()).unwrap();
        assert_eq!(out.questions[0].images.len(), 1);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn open_question_spans_pages() {
        let mut blocks = vec![text(700.0, "Q.3 Starts here")];
        blocks.push(ContentBlock::text(1, BBox::new(10.0, 20.0, 400.0, 30.0), "and ends here"));
        blocks.push(ContentBlock::text(1, BBox::new(10.0, 40.0, 400.0, 50.0), "C. done"));
        let out = parse(blocks);
        assert_eq!(out.questions[0].text, "Starts here and ends here");
        assert_eq!(out.questions[0].page, 0);
        assert_eq!(out.questions[0].options[&Letter::C], "done");
    }

    #[test]
    fn closure_sink_receives_questions_in_order() {
        let mut seen = Vec::new();
        {
            let mut assembler =
                Assembler::with_sink(&ExtractionConfig::default(), |q: Question| seen.push(q.number))
                    .unwrap();
            assembler.feed_page(SourcePage::new(
                0,
                800.0,
                vec![text(10.0, "Q.5 a"), text(20.0, "Q.2 b")],
            ));
            assert!(assembler.is_open());
            let (_, diagnostics, counters) = assembler.finish_into_parts();
            assert!(diagnostics.is_empty());
            assert_eq!(counters.questions, 2);
        }
        assert_eq!(seen, vec![5, 2]);
    }
}
