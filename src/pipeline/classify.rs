//! Line classification: one declarative rule table, first match wins.
//!
//! Order matters and is fixed by the table: a section heading beats a
//! question start, which beats an option row, which beats a bare
//! crossed-out marker. Anything else continues the open question.
//!
//! | Rule            | Example line                    | Result                          |
//! |-----------------|---------------------------------|---------------------------------|
//! | `section`       | `Section : Reasoning`           | `Section("Reasoning")`          |
//! | `question`      | `Q.12 Find the odd one.`        | `QuestionStart(12, "Find …")`   |
//! | `option`        | `☑ B. Dog` / `XC. Car`          | `Option(B, "Dog", true)`        |
//! | `crossed_only`  | `X`                             | `Discard`                       |
//! | (fallback)      | `out of the following words`    | `Continuation(…)`               |
//!
//! Correct markers are `☑ ✓ ✔`; crossed-out markers are `X ✗ ✘ ☒`. A
//! crossed-out option is still a normal option, just not the correct one.

use crate::model::Letter;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

/// What a single text line means to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Starts a new section; the label is trimmed.
    Section(String),
    /// Starts a new question; `lead` is the rest of the line after the marker.
    QuestionStart { number: u32, lead: String },
    /// One multiple-choice option.
    Option {
        letter: Letter,
        text: String,
        correct: bool,
    },
    /// Blank line or a crossed-out marker with no option letter.
    Discard,
    /// Belongs to whatever question is open.
    Continuation(String),
}

struct Rule {
    name: &'static str,
    pattern: Regex,
    /// Returns `None` to let the next rule try (e.g. a number that overflows).
    build: fn(&Captures<'_>) -> Option<LineClass>,
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            name: "section",
            pattern: Regex::new(r"(?is)^section\b\s*[:\-–]?\s*(.+)$").unwrap(),
            build: |caps| {
                let label = caps[1].trim();
                (!label.is_empty()).then(|| LineClass::Section(label.to_string()))
            },
        },
        Rule {
            name: "question",
            pattern: Regex::new(r"(?s)^Q\s*\.\s*(\d+)\s*[.:)]?\s*(.*)$").unwrap(),
            build: |caps| {
                let number: u32 = caps[1].parse().ok().filter(|n| *n > 0)?;
                Some(LineClass::QuestionStart {
                    number,
                    lead: caps[2].trim().to_string(),
                })
            },
        },
        Rule {
            name: "option",
            pattern: Regex::new(r"(?is)^(?:([☑✓✔])|([x✗✘☒]))?\s*([a-d])\s*[.)]\s*(.*)$").unwrap(),
            build: |caps| {
                let letter = caps[3].chars().next().and_then(Letter::from_char)?;
                Some(LineClass::Option {
                    letter,
                    text: caps[4].trim().to_string(),
                    correct: caps.get(1).is_some(),
                })
            },
        },
        Rule {
            name: "crossed_only",
            pattern: Regex::new(r"(?i)^[x✗✘☒]$").unwrap(),
            build: |_| Some(LineClass::Discard),
        },
    ]
});

/// Classify one cleaned text line.
pub fn classify(line: &str) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        return LineClass::Discard;
    }
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(line) {
            if let Some(class) = (rule.build)(&caps) {
                trace!(rule = rule.name, line, "classified");
                return class;
            }
        }
    }
    LineClass::Continuation(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(letter: Letter, text: &str, correct: bool) -> LineClass {
        LineClass::Option {
            letter,
            text: text.to_string(),
            correct,
        }
    }

    #[test]
    fn section_heading() {
        assert_eq!(
            classify("Section : Quantitative Aptitude "),
            LineClass::Section("Quantitative Aptitude".into())
        );
        assert_eq!(classify("SECTION English"), LineClass::Section("English".into()));
    }

    #[test]
    fn words_starting_with_section_are_not_headings() {
        assert_eq!(
            classify("Sections of the act apply"),
            LineClass::Continuation("Sections of the act apply".into())
        );
        assert_eq!(classify("Section"), LineClass::Continuation("Section".into()));
    }

    #[test]
    fn question_start_with_lead_text() {
        assert_eq!(
            classify("Q.12 Find the odd one."),
            LineClass::QuestionStart {
                number: 12,
                lead: "Find the odd one.".into()
            }
        );
        assert_eq!(
            classify("Q. 3"),
            LineClass::QuestionStart {
                number: 3,
                lead: String::new()
            }
        );
    }

    #[test]
    fn question_zero_or_overflow_is_not_a_question() {
        assert_eq!(classify("Q.0 nope"), LineClass::Continuation("Q.0 nope".into()));
        assert!(matches!(
            classify("Q.99999999999 nope"),
            LineClass::Continuation(_)
        ));
    }

    #[test]
    fn option_markers() {
        assert_eq!(classify("☑ B. Dog"), option(Letter::B, "Dog", true));
        assert_eq!(classify("X C. Car"), option(Letter::C, "Car", false));
        assert_eq!(classify("XA. Cat"), option(Letter::A, "Cat", false));
        assert_eq!(classify("D) Horse"), option(Letter::D, "Horse", false));
        assert_eq!(classify("✔c. lower"), option(Letter::C, "lower", true));
    }

    #[test]
    fn letters_outside_a_to_d_continue() {
        assert!(matches!(classify("E. Elephant"), LineClass::Continuation(_)));
        assert!(matches!(classify("Ca. 300 BC"), LineClass::Continuation(_)));
    }

    #[test]
    fn bare_crossed_marker_is_discarded() {
        assert_eq!(classify("X"), LineClass::Discard);
        assert_eq!(classify("✗"), LineClass::Discard);
        assert_eq!(classify("   "), LineClass::Discard);
    }

    #[test]
    fn section_beats_option_like_text() {
        // A heading whose label looks like an option still opens a section.
        assert_eq!(
            classify("Section: A. General Awareness"),
            LineClass::Section("A. General Awareness".into())
        );
    }

    #[test]
    fn plain_text_continues() {
        assert_eq!(
            classify("  which completes the series?"),
            LineClass::Continuation("which completes the series?".into())
        );
    }
}
