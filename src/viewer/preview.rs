//! 16-bit to 8-bit preview conversion.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};

use crate::error::ViewError;
use crate::stack::PageBuffer;

/// Rescale a 16-bit page to 8 bits by dropping the low byte (`v / 256`).
pub fn to_preview(page: &PageBuffer) -> GrayImage {
    GrayImage::from_fn(page.width(), page.height(), |x, y| {
        Luma([(page.get_pixel(x, y).0[0] >> 8) as u8])
    })
}

/// Title of the view showing page `index` of `count`.
pub fn view_title(index: usize, count: usize) -> String {
    format!("Image {} of {}", index + 1, count)
}

/// Encode a preview as PNG.
pub fn encode_png(preview: &GrayImage) -> Result<Vec<u8>, ViewError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            preview.as_raw(),
            preview.width(),
            preview.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| ViewError::Encode {
            message: e.to_string(),
        })?;
    Ok(out)
}
