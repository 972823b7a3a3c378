//! Image decoding and normalisation
//!
//! Any format the `image` crate can sniff is accepted. Non-RGB colour modes
//! (grayscale, RGBA, 16-bit) are converted to 8-bit RGB, then the image is
//! resized (not cropped, aspect ratio not preserved) to the analysis canvas
//! with bilinear interpolation.

use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

/// Side length of the square analysis canvas
pub const ANALYSIS_SIZE: u32 = 128;

/// Image input errors; surfaced to clients as "invalid image"
#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Empty image payload")]
    Empty,

    #[error("Image decode failed: {0}")]
    Decode(String),
}

/// Decode and normalise raw image bytes
pub fn preprocess(bytes: &[u8]) -> Result<RgbImage, ImagingError> {
    if bytes.is_empty() {
        return Err(ImagingError::Empty);
    }

    let decoded =
        image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;

    debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "Decoded image"
    );

    let rgb = decoded.to_rgb8();
    Ok(imageops::resize(
        &rgb,
        ANALYSIS_SIZE,
        ANALYSIS_SIZE,
        FilterType::Triangle,
    ))
}
