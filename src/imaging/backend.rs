//! Codec backend trait and shared error type.
//!
//! The [`ImageBackend`] trait is the byte boundary of the imaging module:
//! turning encoded bytes into a [`Bitmap`] and a [`Bitmap`] back into lossy
//! bytes. Everything between those two edges (orientation, resize, crop)
//! is a pure function in [`operations`](super::operations).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). The cache and the upload
//! pipeline take the backend as a trait object so tests can substitute a
//! recording mock.

use super::bitmap::Bitmap;
use super::params::Quality;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("bytes do not form a decodable image: {0}")]
    DecodeFailure(String),
    #[error("encoding failed: {0}")]
    EncodeFailure(String),
    #[error("crop rectangle does not overlap the {width}x{height} image")]
    EmptyCrop { width: u32, height: u32 },
}

/// Trait for image codec backends.
pub trait ImageBackend: Send + Sync {
    /// Decode bytes into a bitmap, keeping any orientation tag as metadata.
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, CodecError>;

    /// Lossy-encode a bitmap. The output is always upright.
    fn encode(&self, bitmap: &Bitmap, quality: Quality) -> Result<Vec<u8>, CodecError>;
}
