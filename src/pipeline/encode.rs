//! Image encoding: decoded page bitmaps → PNG bytes.
//!
//! JPEG streams are stored as they are. Every other filter (Flate, JBIG2,
//! CCITT, JPX) comes back from pdfium as decoded pixels and is written as
//! PNG.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Extension of every encoded image.
pub const IMAGE_EXT: &str = "png";

/// Extension of images kept in their stored JPEG form.
pub const JPEG_EXT: &str = "jpg";

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!(decoded.width(), 10);
    }
}
