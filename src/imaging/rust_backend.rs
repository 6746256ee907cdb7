//! Pure Rust codec backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with guessed format |
//! | Orientation tag | `ImageDecoder::orientation` (EXIF, read but not applied) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |

use super::backend::{CodecError, ImageBackend};
use super::bitmap::Bitmap;
use super::operations::normalize_orientation;
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, CodecError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::DecodeFailure(format!("unreadable header: {e}")))?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| CodecError::DecodeFailure(e.to_string()))?;

        // Formats without EXIF support report no transform.
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let raster = DynamicImage::from_decoder(decoder)
            .map_err(|e| CodecError::DecodeFailure(e.to_string()))?;
        if raster.width() == 0 || raster.height() == 0 {
            return Err(CodecError::DecodeFailure("zero-area image".to_string()));
        }

        Ok(Bitmap::new(raster).with_orientation(orientation))
    }

    fn encode(&self, bitmap: &Bitmap, quality: Quality) -> Result<Vec<u8>, CodecError> {
        if bitmap.is_empty() {
            return Err(CodecError::EncodeFailure(format!(
                "cannot encode a {}x{} bitmap",
                bitmap.width(),
                bitmap.height()
            )));
        }

        // JPEG carries no orientation tag here, so pixels must already be upright.
        let upright = normalize_orientation(bitmap);
        let rgb = DynamicImage::ImageRgb8(upright.raster().to_rgb8());

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.value());
        rgb.write_with_encoder(encoder)
            .map_err(|e| CodecError::EncodeFailure(e.to_string()))?;
        Ok(bytes)
    }
}
