//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::Rect;

/// Calculate the output size for a width-capped downscale.
///
/// Returns `None` when the source already fits (`width <= max_width`); the
/// caller keeps the source untouched in that case. Never upscales.
///
/// # Arguments
/// * `source` - Upright source dimensions (width, height)
/// * `max_width` - Width ceiling in pixels
///
/// # Returns
/// * `Some((max_width, height))` with the height scaled by the same ratio,
///   never below one pixel
pub fn calculate_resize_dimensions(source: (u32, u32), max_width: u32) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if src_w <= max_width || max_width == 0 {
        return None;
    }
    let ratio = max_width as f64 / src_w as f64;
    let h = ((src_h as f64 * ratio).round() as u32).max(1);
    Some((max_width, h))
}

/// Integer pixel region `(x, y, width, height)` inside a raster.
pub type PixelRegion = (u32, u32, u32, u32);

/// Intersect a fractional crop rectangle with a raster's bounds and snap it
/// to whole pixels.
///
/// Edges are rounded to the nearest pixel after intersection, so a rectangle
/// that already sits on integer coordinates maps onto exactly those pixels.
///
/// # Returns
/// * `None` when the intersection is empty or rounds to zero width/height
pub fn calculate_pixel_region(rect: &Rect, bounds: (u32, u32)) -> Option<PixelRegion> {
    let (bw, bh) = bounds;
    let clip = rect.intersection(&Rect::new(0.0, 0.0, bw as f64, bh as f64))?;

    let left = clip.x.round() as u32;
    let top = clip.y.round() as u32;
    let right = (clip.max_x().round() as u32).min(bw);
    let bottom = (clip.max_y().round() as u32).min(bh);

    if right <= left || bottom <= top {
        return None;
    }
    Some((left, top, right - left, bottom - top))
}

/// Estimated decoded footprint in bytes (four bytes per pixel).
pub fn estimate_decoded_cost(dimensions: (u32, u32)) -> usize {
    let (w, h) = dimensions;
    (w as usize)
        .saturating_mul(h as usize)
        .saturating_mul(4)
}
