//! # cropkeep
//!
//! Image capture plumbing for apps that keep a photo and a framed crop of it
//! side by side: an interactive crop session driven by pinch and pan gestures,
//! codec helpers that normalize and shrink images before they leave the
//! device, a two-tier image cache, and an upload pipeline that stores the
//! original and the crop as one pair.
//!
//! # Architecture: Crop → Prepare → Upload
//!
//! ```text
//! 1. Crop      bitmap + gestures  →  source-pixel rect   (crop::CropSession)
//! 2. Prepare   bitmap             →  JPEG ≤ max width    (imaging::prepare_variant)
//! 3. Upload    two JPEGs          →  two URLs            (upload::UploadPipeline)
//! ```
//!
//! Downloads go the other way through [`cache::ImageCache`]: memory first,
//! then disk, then the network, with every decoded image promoted back into
//! memory.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`crop`] | Crop frame layout, zoom/pan transform, session state machine |
//! | [`imaging`] | Bitmap wrapper, orientation, resize, crop, JPEG compression |
//! | [`cache`] | LRU memory tier over a SHA-256 keyed disk tier |
//! | [`store`] | Object store trait, download URL helpers, filesystem store |
//! | [`upload`] | Dual-variant prepare and upload, replace-then-delete |
//! | [`naming`] | Storage paths for variant pairs |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`types`] | Shared geometry and the persisted `VariantPair` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Geometry Lives in Points, Cropping in Pixels
//!
//! The session works entirely in container points: frame, display size,
//! offsets. Only at commit is the visible frame mapped back to source pixels,
//! using the bitmap's pixel width over the display width. Orientation is
//! applied before the pixel rect is read so the rect always refers to the
//! upright image the user saw.
//!
//! ## Settle on Gesture End
//!
//! Live gestures may overshoot the zoom range and drag the image past the
//! frame edge. The clamp to `[min_scale, max_scale]` and to the covering
//! offset happens once, when the gesture ends, so the user sees the rubber
//! band and then the snap back.
//!
//! ## Fresh Identifier per Pair
//!
//! Both variants share one random identifier and a replacement always gets a
//! new one. The old pair is deleted only after the new URLs are recorded, so
//! a failure anywhere before that leaves the previous record pointing at
//! objects that still exist.
//!
//! ## Cache Writes Never Fail Callers
//!
//! Disk writes are fire-and-forget on the rayon pool. An unwritable directory
//! only costs the disk tier; lookups keep working from memory.

pub mod cache;
pub mod config;
pub mod crop;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod store;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
