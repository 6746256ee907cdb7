//! Crop geometry engine.
//!
//! Turns pan/zoom gestures over a presented bitmap into one crop rectangle
//! in source pixels, with the frame held at a fixed aspect ratio.
//!
//! - [`frame`]: pure geometry (frame layout, cover sizing, offset clamping,
//!   inverse mapping into source pixels)
//! - [`session`]: the [`CropSession`] state machine that sequences it

pub mod frame;
pub mod session;

pub use frame::{CropLayout, Transform};
pub use session::{CommittedCrop, CropSession, CropState, Gesture};

use crate::imaging::CodecError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("invalid gesture: {0}")]
    InvalidGesture(String),
}

#[derive(Error, Debug)]
pub enum CropError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("crop failed: {0}")]
    Codec(#[from] CodecError),
}
