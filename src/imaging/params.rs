//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They travel from
//! configuration into the [`operations`](super::operations) and the upload
//! pipeline, which decide how the pixel work gets done.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`UploadParams`]: canonical pre-upload shape: width ceiling plus encode quality.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    /// Build from a 0.0–1.0 fidelity fraction (0.8 → 80).
    pub fn from_fraction(fraction: f32) -> Self {
        if !fraction.is_finite() {
            return Self::default();
        }
        Self::new((fraction.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Widest output the upload stage produces.
pub const DEFAULT_MAX_WIDTH: u32 = 1200;

/// How each variant is shaped and encoded before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadParams {
    pub max_width: u32,
    pub quality: Quality,
}

impl Default for UploadParams {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: Quality::default(),
        }
    }
}
