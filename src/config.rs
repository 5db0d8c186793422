//! Configuration types for question extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The data-only part of the noise filter
//! (junk patterns, unwanted image hashes) can also be loaded from a JSON
//! [`NoiseProfile`], so supporting a new exam deck never requires touching
//! the parser.

use crate::error::Pdf2QuizError;
use crate::model::FlattenOptions;
use crate::pipeline::noise::HASH_BYTES;
use crate::progress::ProgressCallback;
use img_hash::ImageHash;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Junk lines seen on the supported exam decks: per-question metadata,
/// publisher watermark, app-store banner, bare URLs and file paths.
pub const DEFAULT_JUNK_PATTERNS: &[&str] = &[
    r"Question ID",
    r"Status\s*:",
    r"Chosen Option",
    r"testbook\.com",
    r"GET IT ON Google Play",
    r"^\s*(?:https?://|www\.)\S+\s*$",
    r"^\s*(?:/|[A-Za-z]:\\)\S+\s*$",
];

/// Maximum Hamming distance for a 64-bit hash; thresholds above are meaningless.
pub const MAX_SIMILARITY_THRESHOLD: u32 = 64;

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2quiz::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .fallback_section("Reasoning")
///     .junk_pattern(r"Page \d+ of \d+")
///     .min_image_area(4000.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.fallback_section, "Reasoning");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Regular expressions; a text line matching any of them (anywhere,
    /// case-insensitively) is dropped before classification.
    pub junk_patterns: Vec<String>,

    /// Images whose bounding box is smaller than this many square points are
    /// dropped as icons or logos. Default: 2500 (50×50 pt).
    pub min_image_area: f32,

    /// Base64 perceptual hashes (as printed by `pdf2quiz --fingerprint-images`)
    /// of images that must never be attached, e.g. publisher banners.
    pub unwanted_image_hashes: Vec<String>,

    /// An image whose hash is at a Hamming distance strictly below this value
    /// from any unwanted hash is dropped. Default: 5 of 64 bits, which
    /// tolerates re-encoding and mild rescaling.
    pub similarity_threshold: u32,

    /// Section assigned to questions that appear before any section heading.
    /// Default: "General".
    pub fallback_section: String,

    /// How continuation lines are joined onto a question body.
    pub body_separator: BodySeparator,

    /// Separator placed between options by [`crate::model::Question::flatten`].
    /// Default: `" | "`.
    pub option_separator: String,

    /// Text fragments whose top edges differ by at most this many points are
    /// merged into one line. Default: 2.0.
    pub line_tolerance: f32,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            junk_patterns: DEFAULT_JUNK_PATTERNS.iter().map(|s| s.to_string()).collect(),
            min_image_area: 2500.0,
            unwanted_image_hashes: Vec::new(),
            similarity_threshold: 5,
            fallback_section: "General".to_string(),
            body_separator: BodySeparator::default(),
            option_separator: " | ".to_string(),
            line_tolerance: 2.0,
            pages: PageSelection::default(),
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("junk_patterns", &self.junk_patterns)
            .field("min_image_area", &self.min_image_area)
            .field("unwanted_image_hashes", &self.unwanted_image_hashes.len())
            .field("similarity_threshold", &self.similarity_threshold)
            .field("fallback_section", &self.fallback_section)
            .field("body_separator", &self.body_separator)
            .field("option_separator", &self.option_separator)
            .field("line_tolerance", &self.line_tolerance)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Separators for [`crate::model::Question::flatten`].
    pub fn flatten_options(&self) -> FlattenOptions {
        FlattenOptions {
            body_separator: self.option_separator.clone(),
            option_separator: self.option_separator.clone(),
        }
    }

    /// Check every constraint `build()` enforces. Used again by the entry
    /// points because the fields are public and may have been edited.
    pub fn validate(&self) -> Result<(), Pdf2QuizError> {
        for pattern in &self.junk_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    Pdf2QuizError::InvalidConfig(format!("junk pattern '{pattern}': {e}"))
                })?;
        }
        for hash in &self.unwanted_image_hashes {
            parse_image_hash(hash)?;
        }
        if self.similarity_threshold > MAX_SIMILARITY_THRESHOLD {
            return Err(Pdf2QuizError::InvalidConfig(format!(
                "similarity threshold must be 0–{MAX_SIMILARITY_THRESHOLD}, got {}",
                self.similarity_threshold
            )));
        }
        if !self.min_image_area.is_finite() || self.min_image_area < 0.0 {
            return Err(Pdf2QuizError::InvalidConfig(format!(
                "minimum image area must be a non-negative number, got {}",
                self.min_image_area
            )));
        }
        if !(self.line_tolerance.is_finite() && self.line_tolerance >= 0.0) {
            return Err(Pdf2QuizError::InvalidConfig(format!(
                "line tolerance must be a non-negative number, got {}",
                self.line_tolerance
            )));
        }
        if self.fallback_section.trim().is_empty() {
            return Err(Pdf2QuizError::InvalidConfig(
                "fallback section must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Decode one configured hash literal.
pub(crate) fn parse_image_hash(encoded: &str) -> Result<ImageHash, Pdf2QuizError> {
    let hash: ImageHash = ImageHash::from_base64(encoded.trim()).map_err(|e| {
        Pdf2QuizError::InvalidConfig(format!("unwanted image hash '{encoded}': {e:?}"))
    })?;
    if hash.as_bytes().len() != HASH_BYTES {
        return Err(Pdf2QuizError::InvalidConfig(format!(
            "unwanted image hash '{encoded}' is {} bytes, expected {HASH_BYTES}",
            hash.as_bytes().len()
        )));
    }
    Ok(hash)
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Replace the junk pattern set entirely.
    pub fn junk_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.junk_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Add one pattern to the current set.
    pub fn junk_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.junk_patterns.push(pattern.into());
        self
    }

    pub fn min_image_area(mut self, area: f32) -> Self {
        self.config.min_image_area = area;
        self
    }

    pub fn unwanted_image_hash(mut self, hash: impl Into<String>) -> Self {
        self.config.unwanted_image_hashes.push(hash.into());
        self
    }

    pub fn similarity_threshold(mut self, threshold: u32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn fallback_section(mut self, section: impl Into<String>) -> Self {
        self.config.fallback_section = section.into();
        self
    }

    pub fn body_separator(mut self, sep: BodySeparator) -> Self {
        self.config.body_separator = sep;
        self
    }

    pub fn option_separator(mut self, sep: impl Into<String>) -> Self {
        self.config.option_separator = sep.into();
        self
    }

    pub fn line_tolerance(mut self, points: f32) -> Self {
        self.config.line_tolerance = points;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Merge a [`NoiseProfile`]: patterns and hashes are appended, scalar
    /// settings override only when the profile sets them.
    pub fn noise_profile(mut self, profile: NoiseProfile) -> Self {
        self.config.junk_patterns.extend(profile.junk_patterns);
        self.config
            .unwanted_image_hashes
            .extend(profile.unwanted_image_hashes);
        if let Some(area) = profile.min_image_area {
            self.config.min_image_area = area;
        }
        if let Some(threshold) = profile.similarity_threshold {
            self.config.similarity_threshold = threshold;
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2QuizError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Noise profile ────────────────────────────────────────────────────────

/// Deck-specific noise data, loadable from JSON.
///
/// ```json
/// {
///   "junk_patterns": ["Mock Test \\d+", "www\\.example\\.com"],
///   "unwanted_image_hashes": ["AAAAAP8A/wA="],
///   "similarity_threshold": 6
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseProfile {
    pub junk_patterns: Vec<String>,
    pub unwanted_image_hashes: Vec<String>,
    pub min_image_area: Option<f32>,
    pub similarity_threshold: Option<u32>,
}

impl NoiseProfile {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Pdf2QuizError> {
        let path = path.as_ref();
        let unreadable = |detail: String| Pdf2QuizError::NoiseProfileUnreadable {
            path: path.to_path_buf(),
            detail,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        Self::from_json_str(&raw).map_err(|e| unreadable(e.to_string()))
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How continuation lines are joined onto a question body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodySeparator {
    /// Single space; the body becomes one paragraph. (default)
    #[default]
    Space,
    /// Newline; each source line stays its own line.
    Newline,
}

impl BodySeparator {
    pub fn as_str(self) -> &'static str {
        match self {
            BodySeparator::Space => " ",
            BodySeparator::Newline => "\n",
        }
    }
}

/// Specifies which pages of the PDF to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Parse all pages (default).
    #[default]
    All,
    /// Parse a single page (1-indexed).
    Single(usize),
    /// Parse a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Parse specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// First 1-indexed page the selection names; used in range errors.
    pub fn first_page(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }

    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
