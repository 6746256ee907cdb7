//! In-memory raster with orientation and scale metadata.
//!
//! A [`Bitmap`] keeps pixels in the order they were decoded plus the
//! orientation tag that says how those pixels must be transformed to appear
//! upright. Nothing rotates pixels implicitly: that is the job of
//! [`normalize_orientation`](super::operations::normalize_orientation).
//!
//! Pixel data sits behind an `Arc`, so clones are cheap and a bitmap can be
//! handed to a worker thread or stored in the cache without copying.

use image::DynamicImage;
use image::metadata::Orientation;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Bitmap {
    raster: Arc<DynamicImage>,
    scale: f32,
    orientation: Orientation,
}

impl Bitmap {
    /// Wrap an upright raster at unit scale.
    pub fn new(raster: DynamicImage) -> Self {
        Self {
            raster: Arc::new(raster),
            scale: 1.0,
            orientation: Orientation::NoTransforms,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the device-independent scale factor (pixels per point).
    ///
    /// Non-positive or non-finite values fall back to 1.0.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        self
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_upright(&self) -> bool {
        self.orientation == Orientation::NoTransforms
    }

    /// Width in pixels as displayed (after the orientation tag is applied).
    pub fn width(&self) -> u32 {
        self.upright_dimensions().0
    }

    /// Height in pixels as displayed (after the orientation tag is applied).
    pub fn height(&self) -> u32 {
        self.upright_dimensions().1
    }

    pub fn upright_dimensions(&self) -> (u32, u32) {
        let (w, h) = (self.raster.width(), self.raster.height());
        if swaps_axes(self.orientation) {
            (h, w)
        } else {
            (w, h)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raster.width() == 0 || self.raster.height() == 0
    }

    /// True when both bitmaps share the same pixel buffer.
    pub fn shares_pixels_with(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.raster, &other.raster)
    }

    pub(crate) fn from_parts(raster: DynamicImage, scale: f32, orientation: Orientation) -> Self {
        Self::new(raster).with_scale(scale).with_orientation(orientation)
    }
}

/// Orientations that turn the image a quarter turn swap width and height.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}
