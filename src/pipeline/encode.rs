//! Image encoding: `DynamicImage` → PNG wrapped in [`ImageBlob`].
//!
//! Every image the pdfium source lifts out of a page is re-encoded as PNG,
//! whatever its native filter (DCT, Flate, JBIG2). One lossless format keeps
//! diagrams crisp and gives the perceptual hasher a decodable input.

use crate::model::ImageBlob;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an extracted image as PNG.
pub fn encode_image(img: &DynamicImage) -> Result<ImageBlob, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );

    Ok(ImageBlob::new("image/png", img.width(), img.height(), buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 6, Rgba([255, 0, 0, 255])));
        let blob = encode_image(&img).expect("encode should succeed");
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!((blob.width, blob.height), (10, 6));
        assert!(blob.data.starts_with(b"\x89PNG"));
    }

    #[test]
    fn encoded_blob_decodes_back() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([0, 0, 255, 255])));
        let blob = encode_image(&img).unwrap();
        let decoded = image::load_from_memory(&blob.data).unwrap();
        assert_eq!(decoded.width(), 3);
    }
}
