//! Thumbnail generation: cover-fit, anchored at the top of the page.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::error::{StorageError, StorageResult};
use crate::types::config::ThumbnailSpec;

/// Scale `source` to cover `spec`, crop the overflow keeping the top edge,
/// and encode as JPEG.
///
/// Screenshots are tall; anchoring at the top keeps the above-the-fold part
/// of the page, which is what a listing card should show.
pub fn make_thumbnail(source: &[u8], spec: ThumbnailSpec) -> StorageResult<Vec<u8>> {
    let decoded = image::load_from_memory(source)
        .map_err(|e| StorageError::Thumbnail(format!("decode: {e}")))?;

    let cropped = cover_top(decoded, spec.width, spec.height);

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, spec.quality)
        .encode_image(&cropped.to_rgb8())
        .map_err(|e| StorageError::Thumbnail(format!("encode: {e}")))?;
    Ok(out.into_inner())
}

fn cover_top(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return image;
    }

    let scale = f64::max(
        width as f64 / src_w as f64,
        height as f64 / src_h as f64,
    );
    let scaled_w = ((src_w as f64 * scale).ceil() as u32).max(width);
    let scaled_h = ((src_h as f64 * scale).ceil() as u32).max(height);

    let resized = image.resize_exact(scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    resized.crop_imm(x, 0, width, height)
}
