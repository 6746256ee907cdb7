//! Pure crop geometry.
//!
//! Everything here is a function of its arguments: container size, bitmap
//! size and the current transform in, rectangles out. The session state
//! machine in [`session`](super::session) decides *when* each is evaluated.
//!
//! ## Coordinate spaces
//!
//! ```text
//! container   the on-screen area, origin top-left, in points
//! display     the bitmap as rendered at scale 1.0, centered in the container
//! source      the bitmap's upright pixel grid
//! ```
//!
//! The crop frame is centered in the container. The displayed bitmap is
//! centered too, then scaled about its center and shifted by the offset.

use crate::types::{Offset, Rect, Size};

/// Fixed layout of the crop frame and the allowed zoom range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropLayout {
    /// Frame aspect ratio as `[width, height]`.
    pub aspect_ratio: [u32; 2],
    /// Total horizontal margin between frame and container edges.
    pub margin_x: f64,
    /// Total vertical margin between frame and container edges.
    pub margin_y: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for CropLayout {
    fn default() -> Self {
        Self {
            aspect_ratio: [4, 3],
            margin_x: 40.0,
            margin_y: 160.0,
            min_scale: 1.0,
            max_scale: 5.0,
        }
    }
}

impl CropLayout {
    pub fn aspect(&self) -> f64 {
        self.aspect_ratio[0] as f64 / self.aspect_ratio[1] as f64
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

/// Pan/zoom state of a crop session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub offset: Offset,
    pub container: Size,
}

impl Transform {
    /// Fresh transform for a newly presented bitmap.
    pub fn initial(container: Size) -> Self {
        Self {
            scale: 1.0,
            offset: Offset::ZERO,
            container,
        }
    }
}

/// Largest fixed-aspect frame that fits inside the container margins,
/// centered in the container.
///
/// Width-first: the frame takes the full available width unless that would
/// make it taller than the available height, in which case it is sized by
/// height instead.
///
/// # Returns
/// * `None` when the container leaves no room for a frame
pub fn crop_frame(container: Size, layout: &CropLayout) -> Option<Rect> {
    if container.is_degenerate() {
        return None;
    }
    let max_w = container.width - layout.margin_x;
    let max_h = container.height - layout.margin_y;
    if !(max_w > 0.0 && max_h > 0.0) {
        return None;
    }

    let aspect = layout.aspect();
    let mut width = max_w;
    let mut height = width / aspect;
    if height > max_h {
        height = max_h;
        width = height * aspect;
    }

    Some(Rect::new(
        (container.width - width) / 2.0,
        (container.height - height) / 2.0,
        width,
        height,
    ))
}

/// Rendered bitmap size at scale 1.0.
///
/// The bitmap keeps its own aspect ratio and is sized to cover the frame.
/// A bitmap relatively wider than the frame is sized by height, to at least
/// the frame height and the container height; a relatively taller one is
/// sized by width, symmetrically.
pub fn display_size(bitmap: Size, frame: Size, container: Size) -> Size {
    let image_aspect = bitmap.aspect();
    if image_aspect > frame.aspect() {
        let height = frame.height.max(container.height);
        Size::new(height * image_aspect, height)
    } else {
        let width = frame.width.max(container.width);
        Size::new(width, width / image_aspect)
    }
}

/// Furthest the scaled bitmap may be shifted on each axis while still
/// covering the frame.
pub fn max_offset(display: Size, scale: f64, frame: Size) -> Offset {
    let scaled = display.scaled(scale);
    Offset::new(
        ((scaled.width - frame.width) / 2.0).max(0.0),
        ((scaled.height - frame.height) / 2.0).max(0.0),
    )
}

/// Clamp each offset component into `[-max, max]`.
pub fn clamp_offset(offset: Offset, display: Size, scale: f64, frame: Size) -> Offset {
    let max = max_offset(display, scale, frame);
    Offset::new(
        offset.dx.clamp(-max.dx, max.dx),
        offset.dy.clamp(-max.dy, max.dy),
    )
}

/// Map the frame through the inverse transform into source pixels.
///
/// The returned rectangle is not clipped; callers intersect it with the
/// bitmap bounds.
pub fn source_rect(frame: Size, display: Size, transform: &Transform, pixel_width: f64) -> Rect {
    let scale = transform.scale;
    let scaled = display.scaled(scale);

    let visible_x = (scaled.width / 2.0 - transform.offset.dx - frame.width / 2.0) / scale;
    let visible_y = (scaled.height / 2.0 - transform.offset.dy - frame.height / 2.0) / scale;
    let visible_w = frame.width / scale;
    let visible_h = frame.height / scale;

    let to_pixels = pixel_width / display.width;
    Rect::new(
        visible_x * to_pixels,
        visible_y * to_pixels,
        visible_w * to_pixels,
        visible_h * to_pixels,
    )
}
