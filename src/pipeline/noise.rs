//! Noise filtering: drop junk text lines and junk images before they reach
//! the assembler.
//!
//! Text lines are tested against a compiled [`RegexSet`] built from the
//! configured junk patterns. Images are tested in two steps: bounding-box
//! area (icons, logos, bullets) and perceptual similarity to the configured
//! unwanted-image hashes (publisher banners that survive re-encoding with a
//! few flipped bits).
//!
//! The filter is a pure predicate: the same block always gets the same
//! verdict, and filtering never changes the block.

use crate::config::{parse_image_hash, ExtractionConfig};
use crate::error::Pdf2QuizError;
use crate::model::{BlockPayload, ContentBlock, ImageBlob};
use img_hash::{HashAlg, Hasher, HasherConfig, ImageHash};
use regex::{RegexSet, RegexSetBuilder};
use std::fmt;

/// Hash geometry: 8×8 gradient hash, 64 bits.
const HASH_SIZE: u32 = 8;
/// Encoded length of one hash.
pub(crate) const HASH_BYTES: usize = (HASH_SIZE * HASH_SIZE / 8) as usize;

/// Why a block was kept or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    Keep,
    /// Kept because its image could not be decoded for hashing.
    KeepUnhashable { detail: String },
    /// Text matched the junk pattern with this index.
    JunkText { pattern: usize },
    /// Image bounding box below the minimum area.
    TooSmall { area: f32 },
    /// Image within `distance` bits of an unwanted hash.
    UnwantedImage { distance: u32 },
}

impl FilterVerdict {
    pub fn is_kept(&self) -> bool {
        matches!(self, FilterVerdict::Keep | FilterVerdict::KeepUnhashable { .. })
    }
}

/// Compiled noise filter for one extraction run.
pub struct NoiseFilter {
    junk: RegexSet,
    min_image_area: f32,
    unwanted: Vec<ImageHash>,
    threshold: u32,
    hasher: Hasher,
}

impl fmt::Debug for NoiseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseFilter")
            .field("junk_patterns", &self.junk.len())
            .field("min_image_area", &self.min_image_area)
            .field("unwanted_hashes", &self.unwanted.len())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl NoiseFilter {
    pub fn new(config: &ExtractionConfig) -> Result<Self, Pdf2QuizError> {
        let junk = RegexSetBuilder::new(&config.junk_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| Pdf2QuizError::InvalidConfig(format!("junk patterns: {e}")))?;
        let unwanted = config
            .unwanted_image_hashes
            .iter()
            .map(|h| parse_image_hash(h))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            junk,
            min_image_area: config.min_image_area,
            unwanted,
            threshold: config.similarity_threshold,
            hasher: new_hasher(),
        })
    }

    /// `true` when the block should be passed on to the classifier.
    pub fn keep(&self, block: &ContentBlock) -> bool {
        self.check(block).is_kept()
    }

    /// Full verdict for one block.
    pub fn check(&self, block: &ContentBlock) -> FilterVerdict {
        match &block.payload {
            BlockPayload::Text(text) => self.check_text(text),
            BlockPayload::Image(image) => {
                let area = block.bbox.area();
                if area < self.min_image_area {
                    return FilterVerdict::TooSmall { area };
                }
                self.check_image(image)
            }
        }
    }

    pub fn check_text(&self, text: &str) -> FilterVerdict {
        match self.junk.matches(text).iter().next() {
            Some(pattern) => FilterVerdict::JunkText { pattern },
            None => FilterVerdict::Keep,
        }
    }

    fn check_image(&self, image: &ImageBlob) -> FilterVerdict {
        if self.unwanted.is_empty() {
            return FilterVerdict::Keep;
        }
        let hash = match hash_blob(&self.hasher, image) {
            Ok(hash) => hash,
            Err(detail) => return FilterVerdict::KeepUnhashable { detail },
        };
        match self.unwanted.iter().map(|u| u.dist(&hash)).min() {
            Some(distance) if distance < self.threshold => {
                FilterVerdict::UnwantedImage { distance }
            }
            _ => FilterVerdict::Keep,
        }
    }
}

/// Base64 perceptual hash of an image, in the format accepted by
/// [`ExtractionConfig::unwanted_image_hashes`].
pub fn fingerprint(image: &ImageBlob) -> Result<String, String> {
    hash_blob(&new_hasher(), image).map(|h| h.to_base64())
}

fn new_hasher() -> Hasher {
    HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(HASH_SIZE, HASH_SIZE)
        .to_hasher()
}

fn hash_blob(hasher: &Hasher, image: &ImageBlob) -> Result<ImageHash, String> {
    let decoded = img_hash::image::load_from_memory(&image.data).map_err(|e| e.to_string())?;
    Ok(hasher.hash_image(&decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> ImageBlob {
        let img = GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ImageBlob::new("image/png", width, height, buf)
    }

    fn banner() -> ImageBlob {
        png(64, 64, |x, _| (x * 4) as u8)
    }

    fn diagram() -> ImageBlob {
        png(64, 64, |x, _| 255 - (x * 4) as u8)
    }

    fn block(image: ImageBlob) -> ContentBlock {
        ContentBlock::image(0, BBox::new(0.0, 0.0, 100.0, 100.0), image)
    }

    #[test]
    fn junk_text_matches_anywhere_case_insensitively() {
        let filter = NoiseFilter::new(&ExtractionConfig::default()).unwrap();
        assert!(!filter.keep(&ContentBlock::text(0, BBox::default(), "question id : 4411")));
        assert!(!filter.keep(&ContentBlock::text(0, BBox::default(), "Download from TESTBOOK.COM")));
        assert!(!filter.keep(&ContentBlock::text(0, BBox::default(), "https://example.com/x")));
        assert!(filter.keep(&ContentBlock::text(0, BBox::default(), "Q.1 What is 2+2?")));
    }

    #[test]
    fn small_images_are_dropped() {
        let filter = NoiseFilter::new(&ExtractionConfig::default()).unwrap();
        let icon = ContentBlock::image(0, BBox::new(0.0, 0.0, 20.0, 20.0), diagram());
        assert_eq!(filter.check(&icon), FilterVerdict::TooSmall { area: 400.0 });
    }

    #[test]
    fn unwanted_image_is_dropped_and_others_kept() {
        let hash = fingerprint(&banner()).unwrap();
        let config = ExtractionConfig::builder()
            .unwanted_image_hash(hash)
            .build()
            .unwrap();
        let filter = NoiseFilter::new(&config).unwrap();

        assert_eq!(
            filter.check(&block(banner())),
            FilterVerdict::UnwantedImage { distance: 0 }
        );
        assert!(filter.keep(&block(diagram())));
    }

    #[test]
    fn undecodable_image_is_kept() {
        let hash = fingerprint(&banner()).unwrap();
        let config = ExtractionConfig::builder()
            .unwanted_image_hash(hash)
            .build()
            .unwrap();
        let filter = NoiseFilter::new(&config).unwrap();
        let broken = ImageBlob::new("image/png", 10, 10, vec![0, 1, 2, 3]);

        let verdict = filter.check(&block(broken));
        assert!(matches!(verdict, FilterVerdict::KeepUnhashable { .. }));
        assert!(verdict.is_kept());
    }

    #[test]
    fn verdicts_are_deterministic() {
        let filter = NoiseFilter::new(&ExtractionConfig::default()).unwrap();
        let b = block(diagram());
        assert_eq!(filter.check(&b), filter.check(&b));
    }
}
