//! Crop session state machine.
//!
//! ```text
//!            present                 end_gesture
//!   Idle ───────────────▶ Live ◀──────────────▶ Settled ──commit──▶ Committed
//!                          │   gesture_update      │
//!                          └────────┬──────────────┘
//!                                cancel ──────────────────────────▶ Cancelled
//! ```
//!
//! Gesture updates never clamp the offset;
//! [`CropSession::end_gesture`] re-clamps so the scaled bitmap covers the
//! frame again. `present` may be called from any state and starts over.
//!
//! Degenerate geometry (zero-area bitmap, container too small for a frame)
//! moves the session to [`CropState::Cancelled`] and is reported as
//! [`GeometryError::DegenerateGeometry`], never as a wrong rectangle.

use super::frame::{self, CropLayout, Transform};
use super::{CropError, GeometryError};
use crate::imaging::{Bitmap, operations};
use crate::types::{Offset, Rect, Size};
use tracing::debug;

/// One discrete gesture event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Multiply the current scale by this factor.
    Magnify(f64),
    /// Shift the offset by this delta, in container points.
    Pan(Offset),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CropState {
    Idle,
    Live(Transform),
    Settled(Transform),
    /// Final crop rectangle in upright source pixels.
    Committed(Rect),
    Cancelled,
}

impl CropState {
    pub fn name(&self) -> &'static str {
        match self {
            CropState::Idle => "idle",
            CropState::Live(_) => "live",
            CropState::Settled(_) => "settled",
            CropState::Committed(_) => "committed",
            CropState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CropState::Committed(_) | CropState::Cancelled)
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommittedCrop {
    pub rect: Rect,
    pub bitmap: Bitmap,
}

/// An interactive crop over one presented bitmap.
///
/// Transitions are `&mut self`, so a session is serialized by construction.
#[derive(Debug, Clone)]
pub struct CropSession {
    layout: CropLayout,
    source: Option<Bitmap>,
    state: CropState,
}

impl Default for CropSession {
    fn default() -> Self {
        Self::new(CropLayout::default())
    }
}

impl CropSession {
    pub fn new(layout: CropLayout) -> Self {
        Self {
            layout,
            source: None,
            state: CropState::Idle,
        }
    }

    pub fn layout(&self) -> &CropLayout {
        &self.layout
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }

    /// Current transform while the session is live or settled.
    pub fn transform(&self) -> Option<Transform> {
        match self.state {
            CropState::Live(t) | CropState::Settled(t) => Some(t),
            _ => None,
        }
    }

    /// Crop frame in container coordinates for the current container.
    pub fn crop_frame(&self) -> Option<Rect> {
        frame::crop_frame(self.transform()?.container, &self.layout)
    }

    /// Rendered bitmap size at scale 1.0 for the current container.
    pub fn display_size(&self) -> Option<Size> {
        let transform = self.transform()?;
        let source = self.source.as_ref()?;
        let frame_rect = frame::crop_frame(transform.container, &self.layout)?;
        Some(frame::display_size(
            bitmap_size(source),
            frame_rect.size(),
            transform.container,
        ))
    }

    /// The committed crop rectangle, once the session is committed.
    pub fn crop_rect(&self) -> Option<Rect> {
        match self.state {
            CropState::Committed(rect) => Some(rect),
            _ => None,
        }
    }

    /// Start a new session on `bitmap` inside `container`.
    ///
    /// Valid from any state; any previous session is discarded.
    pub fn present(&mut self, bitmap: Bitmap, container: Size) -> Result<(), GeometryError> {
        self.source = None;
        if bitmap.is_empty() {
            return Err(self.degenerate(format!(
                "bitmap is {}x{}",
                bitmap.width(),
                bitmap.height()
            )));
        }
        self.check_container(container)?;

        debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            container_w = container.width,
            container_h = container.height,
            "crop session presented"
        );
        self.source = Some(bitmap);
        self.state = CropState::Live(Transform::initial(container));
        Ok(())
    }

    /// Apply one gesture. Resumes interaction when settled.
    ///
    /// Invalid gestures are rejected and leave the state unchanged.
    pub fn gesture_update(&mut self, gesture: Gesture) -> Result<(), GeometryError> {
        let mut transform = match self.state {
            CropState::Live(t) | CropState::Settled(t) => t,
            _ => return Err(self.invalid("gesture_update")),
        };

        match gesture {
            Gesture::Magnify(factor) => {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(GeometryError::InvalidGesture(format!(
                        "magnification factor {factor}"
                    )));
                }
                transform.scale = self.layout.clamp_scale(transform.scale * factor);
            }
            Gesture::Pan(delta) => {
                if !(delta.dx.is_finite() && delta.dy.is_finite()) {
                    return Err(GeometryError::InvalidGesture(format!(
                        "pan delta ({}, {})",
                        delta.dx, delta.dy
                    )));
                }
                transform.offset.dx += delta.dx;
                transform.offset.dy += delta.dy;
            }
        }

        self.state = CropState::Live(transform);
        Ok(())
    }

    /// End the current gesture: re-clamp the offset and settle.
    pub fn end_gesture(&mut self) -> Result<(), GeometryError> {
        let CropState::Live(transform) = self.state else {
            return Err(self.invalid("end_gesture"));
        };
        let settled = self.settle(transform)?;
        debug!(
            scale = settled.scale,
            dx = settled.offset.dx,
            dy = settled.offset.dy,
            "crop gesture settled"
        );
        self.state = CropState::Settled(settled);
        Ok(())
    }

    /// Update the container size (rotation, window resize).
    ///
    /// A settled session is re-settled against the new frame.
    pub fn resize_container(&mut self, container: Size) -> Result<(), GeometryError> {
        match self.state {
            CropState::Live(mut t) => {
                self.check_container(container)?;
                t.container = container;
                self.state = CropState::Live(t);
                Ok(())
            }
            CropState::Settled(mut t) => {
                t.container = container;
                let settled = self.settle(t)?;
                self.state = CropState::Settled(settled);
                Ok(())
            }
            _ => Err(self.invalid("resize_container")),
        }
    }

    /// Map the frame back into source pixels and crop the source bitmap.
    ///
    /// Only valid once settled. On a codec failure the session stays settled.
    pub fn commit(&mut self) -> Result<CommittedCrop, CropError> {
        let CropState::Settled(transform) = self.state else {
            return Err(self.invalid("commit").into());
        };
        let source = match self.source.clone() {
            Some(source) => source,
            None => return Err(self.degenerate("no bitmap presented".to_string()).into()),
        };
        let Some(frame_rect) = frame::crop_frame(transform.container, &self.layout) else {
            return Err(self.degenerate("container too small for a crop frame".to_string()).into());
        };

        let pixels = bitmap_size(&source);
        let display = frame::display_size(pixels, frame_rect.size(), transform.container);
        let unclipped = frame::source_rect(frame_rect.size(), display, &transform, pixels.width);
        let bounds = Rect::new(0.0, 0.0, pixels.width, pixels.height);
        let rect = unclipped.intersection(&bounds).unwrap_or(unclipped);

        let bitmap = operations::crop_to_rect(&source, &rect)?;
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "crop committed"
        );
        self.state = CropState::Committed(rect);
        self.source = None;
        Ok(CommittedCrop { rect, bitmap })
    }

    /// Abandon the session. Valid in every state before commit.
    pub fn cancel(&mut self) -> Result<(), GeometryError> {
        if let CropState::Committed(_) = self.state {
            return Err(self.invalid("cancel"));
        }
        self.source = None;
        self.state = CropState::Cancelled;
        debug!("crop session cancelled");
        Ok(())
    }

    fn settle(&mut self, transform: Transform) -> Result<Transform, GeometryError> {
        let frame_rect = self.check_container(transform.container)?;
        let Some(pixels) = self.source.as_ref().map(bitmap_size) else {
            return Err(self.degenerate("no bitmap presented".to_string()));
        };
        let display = frame::display_size(pixels, frame_rect.size(), transform.container);
        let scale = self.layout.clamp_scale(transform.scale);
        Ok(Transform {
            scale,
            offset: frame::clamp_offset(transform.offset, display, scale, frame_rect.size()),
            container: transform.container,
        })
    }

    fn check_container(&mut self, container: Size) -> Result<Rect, GeometryError> {
        frame::crop_frame(container, &self.layout).ok_or_else(|| {
            self.degenerate(format!(
                "container {}x{} leaves no room for a crop frame",
                container.width, container.height
            ))
        })
    }

    fn degenerate(&mut self, reason: String) -> GeometryError {
        debug!(%reason, "crop session cancelled on degenerate geometry");
        self.source = None;
        self.state = CropState::Cancelled;
        GeometryError::DegenerateGeometry(reason)
    }

    fn invalid(&self, event: &'static str) -> GeometryError {
        GeometryError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }
}

fn bitmap_size(bitmap: &Bitmap) -> Size {
    Size::new(bitmap.width() as f64, bitmap.height() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::CodecError;
    use crate::test_helpers::gradient_bitmap;
    use image::metadata::Orientation;

    fn phone() -> Size {
        Size::new(400.0, 800.0)
    }

    fn live_session(w: u32, h: u32) -> CropSession {
        let mut s = CropSession::default();
        s.present(gradient_bitmap(w, h), phone()).unwrap();
        s
    }

    // =========================================================================
    // present
    // =========================================================================

    #[test]
    fn present_starts_live_at_identity() {
        let s = live_session(300, 200);
        assert_eq!(
            s.state(),
            &CropState::Live(Transform {
                scale: 1.0,
                offset: Offset::ZERO,
                container: phone()
            })
        );
        assert_eq!(s.crop_frame(), Some(Rect::new(20.0, 265.0, 360.0, 270.0)));
        assert_eq!(s.display_size(), Some(Size::new(1200.0, 800.0)));
    }

    #[test]
    fn present_resets_previous_session() {
        let mut s = live_session(300, 200);
        s.gesture_update(Gesture::Magnify(3.0)).unwrap();
        s.cancel().unwrap();

        s.present(gradient_bitmap(200, 300), phone()).unwrap();
        assert_eq!(s.transform().unwrap().scale, 1.0);
        assert_eq!(s.display_size(), Some(Size::new(400.0, 600.0)));
    }

    #[test]
    fn present_zero_area_bitmap_cancels() {
        let mut s = CropSession::default();
        let empty = Bitmap::new(image::DynamicImage::ImageRgb8(image::RgbImage::new(0, 10)));
        let err = s.present(empty, phone()).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateGeometry(_)));
        assert_eq!(s.state(), &CropState::Cancelled);
    }

    #[test]
    fn present_degenerate_container_cancels() {
        for container in [Size::new(0.0, 800.0), Size::new(30.0, 800.0), Size::new(400.0, 0.0)] {
            let mut s = CropSession::default();
            let err = s.present(gradient_bitmap(10, 10), container).unwrap_err();
            assert!(matches!(err, GeometryError::DegenerateGeometry(_)), "{container:?}");
            assert_eq!(s.state(), &CropState::Cancelled);
        }
    }

    // =========================================================================
    // gestures
    // =========================================================================

    #[test]
    fn magnify_multiplies_and_clamps() {
        let mut s = live_session(300, 200);
        s.gesture_update(Gesture::Magnify(2.0)).unwrap();
        assert_eq!(s.transform().unwrap().scale, 2.0);
        s.gesture_update(Gesture::Magnify(10.0)).unwrap();
        assert_eq!(s.transform().unwrap().scale, 5.0);
        s.gesture_update(Gesture::Magnify(0.01)).unwrap();
        assert_eq!(s.transform().unwrap().scale, 1.0);
    }

    #[test]
    fn pan_accumulates_without_clamping() {
        let mut s = live_session(300, 200);
        s.gesture_update(Gesture::Pan(Offset::new(800.0, 0.0))).unwrap();
        s.gesture_update(Gesture::Pan(Offset::new(700.0, -900.0))).unwrap();
        assert_eq!(s.transform().unwrap().offset, Offset::new(1500.0, -900.0));
        assert!(matches!(s.state(), CropState::Live(_)));
    }

    #[test]
    fn invalid_gestures_leave_state_unchanged() {
        let mut s = live_session(300, 200);
        s.gesture_update(Gesture::Magnify(2.0)).unwrap();
        let before = s.state().clone();

        for g in [
            Gesture::Magnify(0.0),
            Gesture::Magnify(-1.0),
            Gesture::Magnify(f64::NAN),
            Gesture::Pan(Offset::new(f64::INFINITY, 0.0)),
        ] {
            assert!(matches!(
                s.gesture_update(g),
                Err(GeometryError::InvalidGesture(_))
            ));
        }
        assert_eq!(s.state(), &before);
    }

    #[test]
    fn gesture_after_settle_resumes_live() {
        let mut s = live_session(300, 200);
        s.end_gesture().unwrap();
        s.gesture_update(Gesture::Pan(Offset::new(5.0, 5.0))).unwrap();
        assert!(matches!(s.state(), CropState::Live(_)));
    }

    // =========================================================================
    // settle
    // =========================================================================

    #[test]
    fn settle_clamps_offset_to_cover_frame() {
        let mut s = live_session(3000, 2000);
        s.gesture_update(Gesture::Pan(Offset::new(1000.0, 1000.0))).unwrap();
        s.end_gesture().unwrap();
        let CropState::Settled(t) = s.state() else {
            panic!("expected settled, got {:?}", s.state());
        };
        assert_eq!(t.offset, Offset::new(420.0, 265.0));
    }

    #[test]
    fn settled_offset_never_exceeds_bound() {
        let mut s = live_session(3000, 2000);
        let gestures = [
            Gesture::Magnify(1.7),
            Gesture::Pan(Offset::new(-4000.0, 123.0)),
            Gesture::Magnify(0.4),
            Gesture::Pan(Offset::new(50.0, -9999.0)),
            Gesture::Magnify(4.2),
        ];
        for g in gestures {
            s.gesture_update(g).unwrap();
            s.end_gesture().unwrap();

            let t = s.transform().unwrap();
            let frame = s.crop_frame().unwrap().size();
            let scaled = s.display_size().unwrap().scaled(t.scale);
            assert!(t.offset.dx.abs() <= (scaled.width - frame.width) / 2.0 + 1e-9);
            assert!(t.offset.dy.abs() <= (scaled.height - frame.height) / 2.0 + 1e-9);
        }
    }

    #[test]
    fn end_gesture_requires_live() {
        let mut s = CropSession::default();
        assert_eq!(
            s.end_gesture(),
            Err(GeometryError::InvalidTransition {
                state: "idle",
                event: "end_gesture"
            })
        );

        let mut s = live_session(300, 200);
        s.end_gesture().unwrap();
        assert!(matches!(
            s.end_gesture(),
            Err(GeometryError::InvalidTransition { state: "settled", .. })
        ));
    }

    // =========================================================================
    // resize_container
    // =========================================================================

    #[test]
    fn resize_settled_reclamps() {
        let mut s = live_session(3000, 2000);
        s.gesture_update(Gesture::Pan(Offset::new(1000.0, 0.0))).unwrap();
        s.end_gesture().unwrap();
        assert_eq!(s.transform().unwrap().offset.dx, 420.0);

        // 800x400: frame 320x240, display 600x400, max dx = 140.
        s.resize_container(Size::new(800.0, 400.0)).unwrap();
        let t = s.transform().unwrap();
        assert!(matches!(s.state(), CropState::Settled(_)));
        assert_eq!(t.offset.dx, 140.0);
        assert_eq!(t.container, Size::new(800.0, 400.0));
    }

    #[test]
    fn resize_to_degenerate_cancels() {
        let mut s = live_session(300, 200);
        let err = s.resize_container(Size::new(10.0, 10.0)).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateGeometry(_)));
        assert_eq!(s.state(), &CropState::Cancelled);
    }

    #[test]
    fn resize_when_idle_is_invalid() {
        let mut s = CropSession::default();
        assert!(matches!(
            s.resize_container(phone()),
            Err(GeometryError::InvalidTransition { .. })
        ));
    }

    // =========================================================================
    // commit / cancel
    // =========================================================================

    #[test]
    fn commit_centered_landscape() {
        let mut s = live_session(3000, 2000);
        s.end_gesture().unwrap();
        let committed = s.commit().unwrap();

        assert_eq!(committed.rect, Rect::new(1050.0, 662.5, 900.0, 675.0));
        assert_eq!(committed.bitmap.upright_dimensions(), (900, 675));
        assert_eq!(s.crop_rect(), Some(committed.rect));
        assert!(s.state().is_terminal());
    }

    #[test]
    fn commit_after_pan_to_corner() {
        let mut s = live_session(3000, 2000);
        s.gesture_update(Gesture::Pan(Offset::new(1000.0, 1000.0))).unwrap();
        s.end_gesture().unwrap();
        let committed = s.commit().unwrap();
        assert_eq!(committed.rect, Rect::new(0.0, 0.0, 900.0, 675.0));
    }

    #[test]
    fn commit_portrait_scales_by_pixel_ratio() {
        let mut s = live_session(2000, 3000);
        s.end_gesture().unwrap();
        let committed = s.commit().unwrap();
        // Display 400x600, five source pixels per point.
        assert_eq!(committed.rect.size(), Size::new(1800.0, 1350.0));
        assert_eq!(committed.rect.x, 100.0);
        assert_eq!(committed.rect.y, 825.0);
    }

    #[test]
    fn commit_uses_upright_dimensions() {
        // Stored 2000x3000, displayed as 3000x2000.
        let bmp = gradient_bitmap(2000, 3000).with_orientation(Orientation::Rotate90);
        let mut s = CropSession::default();
        s.present(bmp, phone()).unwrap();
        s.end_gesture().unwrap();
        let committed = s.commit().unwrap();
        assert_eq!(committed.rect, Rect::new(1050.0, 662.5, 900.0, 675.0));
        assert!(committed.bitmap.is_upright());
    }

    #[test]
    fn commit_requires_settled() {
        let mut s = live_session(300, 200);
        assert!(matches!(
            s.commit(),
            Err(CropError::Geometry(GeometryError::InvalidTransition {
                state: "live",
                event: "commit"
            }))
        ));
    }

    #[test]
    fn commit_rect_stays_inside_bitmap() {
        let mut s = live_session(1234, 567);
        s.gesture_update(Gesture::Magnify(3.3)).unwrap();
        s.gesture_update(Gesture::Pan(Offset::new(-5000.0, 5000.0))).unwrap();
        s.end_gesture().unwrap();
        let rect = s.commit().unwrap().rect;
        assert!(rect.x >= 0.0 && rect.y >= 0.0);
        assert!(rect.max_x() <= 1234.0 + 1e-6 && rect.max_y() <= 567.0 + 1e-6);
    }

    #[test]
    fn cancel_before_commit_discards_session() {
        let mut s = live_session(300, 200);
        s.end_gesture().unwrap();
        s.cancel().unwrap();
        assert_eq!(s.state(), &CropState::Cancelled);
        assert_eq!(s.transform(), None);
        assert_eq!(s.display_size(), None);
        assert!(matches!(
            s.commit(),
            Err(CropError::Geometry(GeometryError::InvalidTransition { .. }))
        ));
    }

    #[test]
    fn cancel_after_commit_is_invalid() {
        let mut s = live_session(300, 200);
        s.end_gesture().unwrap();
        s.commit().unwrap();
        assert!(matches!(
            s.cancel(),
            Err(GeometryError::InvalidTransition {
                state: "committed",
                ..
            })
        ));
    }

    #[test]
    fn codec_error_variant_is_reachable() {
        let err: CropError = CodecError::EmptyCrop {
            width: 1,
            height: 1,
        }
        .into();
        assert!(matches!(err, CropError::Codec(_)));
    }
}
