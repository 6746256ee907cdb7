//! Shared fixture builders for the cropkeep test suite.
//!
//! Bitmaps are generated in memory so tests never depend on fixture files.
//! Pixel values are deterministic, which lets crop tests compare individual
//! pixels against the source.

use crate::imaging::Bitmap;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// =========================================================================
// Bitmaps
// =========================================================================

/// Upright RGB bitmap whose red channel tracks x and green channel tracks y.
pub fn gradient_bitmap(width: u32, height: u32) -> Bitmap {
    Bitmap::new(DynamicImage::ImageRgb8(gradient_raster(width, height)))
}

/// Upright bitmap split into four flat quadrants.
///
/// Top-left red, top-right green, bottom-left blue, bottom-right white.
pub fn quadrant_bitmap(width: u32, height: u32) -> Bitmap {
    let img = RgbImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => Rgb([255, 0, 0]),
            (false, true) => Rgb([0, 255, 0]),
            (true, false) => Rgb([0, 0, 255]),
            (false, false) => Rgb([255, 255, 255]),
        }
    });
    Bitmap::new(DynamicImage::ImageRgb8(img))
}

/// Flat single-color bitmap, handy for lossy round-trip comparisons.
pub fn solid_bitmap(width: u32, height: u32, color: [u8; 3]) -> Bitmap {
    Bitmap::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb(color),
    )))
}

fn gradient_raster(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

// =========================================================================
// Encoded bytes
// =========================================================================

/// PNG-encoded gradient (lossless, so decoded pixels match exactly).
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(gradient_raster(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// =========================================================================
// Pixel comparison
// =========================================================================

/// Largest per-channel difference between two equally sized bitmaps.
///
/// Panics if the upright dimensions differ.
pub fn max_channel_diff(a: &Bitmap, b: &Bitmap) -> u8 {
    assert_eq!(
        a.upright_dimensions(),
        b.upright_dimensions(),
        "bitmap dimensions differ"
    );
    let a = a.raster().to_rgb8();
    let b = b.raster().to_rgb8();
    a.pixels()
        .zip(b.pixels())
        .flat_map(|(pa, pb)| pa.0.into_iter().zip(pb.0).map(|(x, y)| x.abs_diff(y)))
        .max()
        .unwrap_or(0)
}
