use image::{ImageError, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Encode a rendered glyph canvas to PNG bytes for the recognition engine.
///
/// Canvases here are small (a few glyph cells), so synchronous encoding is
/// cheap enough to run inline on the dispatch path.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    image::DynamicImage::ImageRgba8(canvas.clone()).write_to(&mut cursor, ImageFormat::Png)?;
    Ok(png_bytes)
}
