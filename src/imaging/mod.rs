//! Image codec utilities, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` + EXIF orientation from the decoder |
//! | **Normalize orientation** | `DynamicImage::apply_orientation` |
//! | **Resize** | Lanczos3 `resize_exact`, width-capped, never upscales |
//! | **Crop** | `crop_imm` on the rounded bounds intersection |
//! | **Compress → JPEG** | `JpegEncoder::new_with_quality` |
//!
//! The module is split into:
//! - **Bitmap**: the in-memory raster with orientation and scale metadata
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing encode/shape settings
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pure transforms combining calculations + backend

pub mod backend;
pub mod bitmap;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, ImageBackend};
pub use bitmap::Bitmap;
pub use calculations::{PixelRegion, calculate_pixel_region, estimate_decoded_cost};
pub use operations::{
    compress, crop_to_rect, normalize_orientation, prepare_variant, process_for_upload, resize,
};
pub use params::{DEFAULT_MAX_WIDTH, Quality, UploadParams};
pub use rust_backend::RustBackend;
