//! Shared types used across the imaging, crop, and upload modules.
//!
//! Geometry primitives are plain `f64` value types. Container/display space
//! and source-pixel space both use them; which space a value lives in is
//! named by the field or function that carries it, not by the type.

use serde::{Deserialize, Serialize};

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero, negative, or not a number.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// A translation in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// An axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// True for rectangles with no area (including NaN components).
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Overlap of two rectangles, or `None` when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.max_x().min(other.max_x());
        let y1 = self.max_y().min(other.max_y());
        let rect = Rect::new(x0, y0, x1 - x0, y1 - y0);
        if rect.is_empty() { None } else { Some(rect) }
    }
}

/// Remote locations of one uploaded original/cropped pair.
///
/// Persisted by callers as two string fields on an application record, which
/// is why the serde names follow the record's `image_url` / `cropped_image_url`
/// columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPair {
    #[serde(rename = "image_url")]
    pub original_url: String,
    #[serde(rename = "cropped_image_url")]
    pub cropped_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_degenerate_detection() {
        assert!(Size::new(0.0, 10.0).is_degenerate());
        assert!(Size::new(10.0, -1.0).is_degenerate());
        assert!(Size::new(f64::NAN, 10.0).is_degenerate());
        assert!(!Size::new(1.0, 1.0).is_degenerate());
    }

    #[test]
    fn intersection_partial_overlap() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 80.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(50.0, 80.0, 50.0, 20.0)));
    }

    #[test]
    fn intersection_disjoint_is_none() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn intersection_touching_edges_is_none() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn variant_pair_uses_record_field_names() {
        let pair = VariantPair {
            original_url: "a".into(),
            cropped_url: "b".into(),
        };
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#"{"image_url":"a","cropped_image_url":"b"}"#);
    }
}
