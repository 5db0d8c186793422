//! Result types returned by the extraction entry points.

use crate::error::Diagnostic;
use crate::model::{FlattenOptions, Letter, Question};
use serde::Serialize;

/// Everything one extraction produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionOutput {
    /// Questions in document order.
    pub questions: Vec<Question>,
    /// Non-fatal anomalies, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
    pub metadata: DocumentMetadata,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Distinct section labels in order of first appearance.
    pub fn sections(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for q in &self.questions {
            if !seen.contains(&q.section.as_str()) {
                seen.push(&q.section);
            }
        }
        seen
    }

    /// Questions belonging to one section, in document order.
    pub fn in_section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a Question> + 'a {
        self.questions.iter().filter(move |q| q.section == section)
    }

    /// Questions grouped by section in order of first appearance, each group
    /// stably sorted by printed number.
    pub fn sorted_by_number(&self) -> Vec<&Question> {
        self.sections()
            .into_iter()
            .flat_map(|section| {
                let mut group: Vec<&Question> = self.in_section(section).collect();
                group.sort_by_key(|q| q.number);
                group
            })
            .collect()
    }

    /// Correct letters per section, sections in order of first appearance
    /// and questions by number within each.
    pub fn answer_key(&self) -> Vec<SectionAnswers> {
        let mut key: Vec<SectionAnswers> = Vec::new();
        for q in self.sorted_by_number() {
            let entry = AnswerKeyEntry {
                number: q.number,
                correct: q.correct,
            };
            match key.last_mut() {
                Some(group) if group.section == q.section => group.answers.push(entry),
                _ => key.push(SectionAnswers {
                    section: q.section.clone(),
                    answers: vec![entry],
                }),
            }
        }
        key
    }

    /// Every question flattened to one line.
    pub fn flatten(&self, opts: &FlattenOptions) -> Vec<String> {
        self.questions.iter().map(|q| q.flatten(opts)).collect()
    }
}

/// The answer key of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionAnswers {
    pub section: String,
    pub answers: Vec<AnswerKeyEntry>,
}

/// One row of an answer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerKeyEntry {
    pub number: u32,
    /// `None` when no option carried a correct marker.
    pub correct: Option<Letter>,
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages read and fed to the assembler.
    pub processed_pages: usize,
    /// Pages whose content could not be read.
    pub failed_pages: usize,
    /// Text lines and images seen, before filtering.
    pub blocks_seen: usize,
    /// Blocks dropped as noise.
    pub blocks_filtered: usize,
    pub images_attached: usize,
    /// Body-like lines seen while no question was open.
    pub orphan_lines: usize,
    pub questions: usize,
    /// Questions with no correct marker.
    pub unanswered: usize,
    pub total_duration_ms: u64,
}

/// Document metadata from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn q(number: u32, section: &str, correct: Option<Letter>) -> Question {
        Question {
            number,
            text: format!("question {number}"),
            options: BTreeMap::new(),
            correct,
            images: vec![],
            section: section.into(),
            page: 0,
        }
    }

    fn output() -> ExtractionOutput {
        ExtractionOutput {
            questions: vec![
                q(3, "Reasoning", Some(Letter::A)),
                q(1, "Reasoning", None),
                q(1, "English", Some(Letter::D)),
                q(2, "Reasoning", Some(Letter::B)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn sections_in_first_appearance_order() {
        assert_eq!(output().sections(), vec!["Reasoning", "English"]);
    }

    #[test]
    fn sorted_by_number_keeps_sections_together() {
        let out = output();
        let sorted: Vec<(u32, &str)> = out
            .sorted_by_number()
            .iter()
            .map(|q| (q.number, q.section.as_str()))
            .collect();
        assert_eq!(
            sorted,
            vec![(1, "Reasoning"), (2, "Reasoning"), (3, "Reasoning"), (1, "English")]
        );
    }

    #[test]
    fn sorted_by_number_is_stable_within_a_section() {
        let mut out = output();
        out.questions.push(q(1, "Reasoning", Some(Letter::C)));
        let reasoning: Vec<Option<Letter>> = out
            .sorted_by_number()
            .iter()
            .filter(|q| q.section == "Reasoning" && q.number == 1)
            .map(|q| q.correct)
            .collect();
        assert_eq!(reasoning, vec![None, Some(Letter::C)]);
    }

    #[test]
    fn answer_key_groups_by_section_then_number() {
        let out = ExtractionOutput {
            questions: vec![
                q(2, "Reasoning", Some(Letter::A)),
                q(1, "English", Some(Letter::B)),
                q(1, "Reasoning", Some(Letter::C)),
            ],
            ..Default::default()
        };
        let key = out.answer_key();
        assert_eq!(
            key,
            vec![
                SectionAnswers {
                    section: "Reasoning".into(),
                    answers: vec![
                        AnswerKeyEntry { number: 1, correct: Some(Letter::C) },
                        AnswerKeyEntry { number: 2, correct: Some(Letter::A) },
                    ],
                },
                SectionAnswers {
                    section: "English".into(),
                    answers: vec![AnswerKeyEntry { number: 1, correct: Some(Letter::B) }],
                },
            ]
        );
    }

    #[test]
    fn unanswered_questions_stay_in_the_key() {
        let key = output().answer_key();
        assert_eq!(key[0].answers[0], AnswerKeyEntry { number: 1, correct: None });
        assert_eq!(output().in_section("English").count(), 1);
    }
}
