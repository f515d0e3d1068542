//! Bounded-size JPEG thumbnail encoding for the `frame` wire event.
//!
//! Full frames are never shipped to the browser; every observation is scaled
//! down to fit [`THUMBNAIL_MAX_WIDTH`] × [`THUMBNAIL_MAX_HEIGHT`] before
//! being JPEG-encoded and base64-wrapped.

use armdeck_types::ArmError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbImage};

use crate::source::ArmImage;

/// Thumbnail bounding box (aspect ratio is preserved).
pub const THUMBNAIL_MAX_WIDTH: u32 = 320;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 240;

/// Encode `frame` as a base64 JPEG thumbnail no larger than the bounding box.
///
/// # Errors
///
/// Returns [`ArmError::Encode`] when the raw buffer length does not match the
/// declared dimensions or the JPEG encoder fails.
pub fn encode_thumbnail(frame: &ArmImage) -> Result<String, ArmError> {
    let rgb = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(
        || {
            ArmError::Encode(format!(
                "buffer length {} does not match {}x{} RGB24",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        },
    )?;

    let thumb = DynamicImage::ImageRgb8(rgb).thumbnail(THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT);

    let mut jpeg = Vec::new();
    thumb
        .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| ArmError::Encode(format!("JPEG encode failed: {e}")))?;

    Ok(STANDARD.encode(&jpeg))
}
