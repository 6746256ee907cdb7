//! Pure image operations.
//!
//! Every function takes its input by reference and returns a new value, so
//! independent bitmaps can be processed concurrently without coordination.
//! Operations that have nothing to do hand back a clone of the input, which
//! shares the same pixel buffer: no re-render, no recompression.

use super::backend::{CodecError, ImageBackend};
use super::bitmap::Bitmap;
use super::calculations::{calculate_pixel_region, calculate_resize_dimensions};
use super::params::{Quality, UploadParams};
use super::rust_backend::RustBackend;
use crate::types::Rect;
use image::imageops::FilterType;
use image::metadata::Orientation;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Re-render pixels so they are stored upright and drop the orientation tag.
///
/// Already-upright bitmaps are returned as-is (same pixel buffer).
pub fn normalize_orientation(bitmap: &Bitmap) -> Bitmap {
    if bitmap.is_upright() {
        return bitmap.clone();
    }
    let mut raster = bitmap.raster().clone();
    raster.apply_orientation(bitmap.orientation());
    Bitmap::from_parts(raster, bitmap.scale(), Orientation::NoTransforms)
}

/// Downscale so the upright width is at most `max_width`, keeping aspect ratio.
///
/// Bitmaps that already fit are returned unchanged; nothing is ever upscaled.
pub fn resize(bitmap: &Bitmap, max_width: u32) -> Bitmap {
    let Some((width, height)) = calculate_resize_dimensions(bitmap.upright_dimensions(), max_width)
    else {
        return bitmap.clone();
    };
    let upright = normalize_orientation(bitmap);
    let resized = upright
        .raster()
        .resize_exact(width, height, FilterType::Lanczos3);
    Bitmap::from_parts(resized, bitmap.scale(), Orientation::NoTransforms)
}

/// Cut `rect` (upright source-pixel coordinates) out of the bitmap.
///
/// The rectangle is clipped to the bitmap's bounds first. The result is
/// upright and at unit scale.
///
/// # Errors
/// [`CodecError::EmptyCrop`] when the clipped rectangle has no pixels.
pub fn crop_to_rect(bitmap: &Bitmap, rect: &Rect) -> Result<Bitmap> {
    let upright = normalize_orientation(bitmap);
    let bounds = upright.upright_dimensions();
    let (x, y, w, h) =
        calculate_pixel_region(rect, bounds).ok_or(CodecError::EmptyCrop {
            width: bounds.0,
            height: bounds.1,
        })?;
    Ok(Bitmap::new(upright.raster().crop_imm(x, y, w, h)))
}

/// Lossy-encode the bitmap as JPEG.
///
/// # Errors
/// [`CodecError::EncodeFailure`] for zero-area bitmaps or encoder failures.
pub fn compress(bitmap: &Bitmap, quality: Quality) -> Result<Vec<u8>> {
    RustBackend::new().encode(bitmap, quality)
}

/// Canonical pre-upload shape: upright, then width-capped.
pub fn process_for_upload(bitmap: &Bitmap, max_width: u32) -> Bitmap {
    resize(&normalize_orientation(bitmap), max_width)
}

/// Shape and encode one variant for upload with the given backend.
pub fn prepare_variant(
    backend: &dyn ImageBackend,
    bitmap: &Bitmap,
    params: UploadParams,
) -> Result<Vec<u8>> {
    let shaped = process_for_upload(bitmap, params.max_width);
    backend.encode(&shaped, params.quality)
}
