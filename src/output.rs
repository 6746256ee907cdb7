//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Crop
//!
//! ```text
//! photo.jpg → photo-crop.jpg
//!     Crop: 500,300 1200x900
//!     Output: 1200x900, 184.2 KiB
//! ```
//!
//! `prepare` prints the same shape with a `Source:` line in place of `Crop:`.
//!
//! ## Cache
//!
//! ```text
//! Cache /home/me/.cache/cropkeep/ImageCache
//!     Memory: 4 entries, 1.2 MiB
//!     Lookups: 3 memory hits, 1 disk hits, 2 misses
//!     Disk: 12 files, 3.4 MiB
//! ```
//!
//! Upload results are printed as JSON so scripts can pick up the URLs.
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O.

use crate::cache::{CacheStats, DiskUsage};
use crate::types::{Rect, VariantPair};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with binary units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn transfer_header(input: &Path, output: &Path) -> String {
    format!("{} → {}", file_name(input), file_name(output))
}

fn encoded_line((width, height): (u32, u32), encoded_bytes: usize) -> String {
    format!(
        "{}Output: {}x{}, {}",
        indent(1),
        width,
        height,
        format_bytes(encoded_bytes as u64)
    )
}

// ============================================================================
// Crop output
// ============================================================================

/// Format the result of a `crop` command.
pub fn format_crop_result(
    input: &Path,
    output: &Path,
    rect: &Rect,
    dimensions: (u32, u32),
    encoded_bytes: usize,
) -> Vec<String> {
    vec![
        transfer_header(input, output),
        format!(
            "{}Crop: {},{} {}x{}",
            indent(1),
            rect.x.round(),
            rect.y.round(),
            rect.width.round(),
            rect.height.round()
        ),
        encoded_line(dimensions, encoded_bytes),
    ]
}

pub fn print_crop_result(
    input: &Path,
    output: &Path,
    rect: &Rect,
    dimensions: (u32, u32),
    encoded_bytes: usize,
) {
    for line in format_crop_result(input, output, rect, dimensions, encoded_bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// Prepare output
// ============================================================================

/// Format the result of a `prepare` command.
pub fn format_prepare_result(
    input: &Path,
    output: &Path,
    source: (u32, u32),
    prepared: (u32, u32),
    encoded_bytes: usize,
) -> Vec<String> {
    vec![
        transfer_header(input, output),
        format!("{}Source: {}x{}", indent(1), source.0, source.1),
        encoded_line(prepared, encoded_bytes),
    ]
}

pub fn print_prepare_result(
    input: &Path,
    output: &Path,
    source: (u32, u32),
    prepared: (u32, u32),
    encoded_bytes: usize,
) {
    for line in format_prepare_result(input, output, source, prepared, encoded_bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// Upload output
// ============================================================================

/// Pretty JSON for an uploaded pair, using the record field names.
pub fn format_variant_pair(pair: &VariantPair) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(pair)
}

pub fn print_variant_pair(pair: &VariantPair) -> Result<(), serde_json::Error> {
    println!("{}", format_variant_pair(pair)?);
    Ok(())
}

// ============================================================================
// Cache output
// ============================================================================

/// Format a cache report: memory residency, lookup counters, disk usage.
pub fn format_cache_stats(dir: &Path, stats: &CacheStats, usage: &DiskUsage) -> Vec<String> {
    vec![
        format!("Cache {}", dir.display()),
        format!(
            "{}Memory: {} entries, {}",
            indent(1),
            stats.entries,
            format_bytes(stats.cost_bytes as u64)
        ),
        format!(
            "{}Lookups: {} memory hits, {} disk hits, {} misses",
            indent(1),
            stats.memory_hits,
            stats.disk_hits,
            stats.misses
        ),
        format!(
            "{}Disk: {} files, {}",
            indent(1),
            usage.files,
            format_bytes(usage.bytes)
        ),
    ]
}

pub fn print_cache_stats(dir: &Path, stats: &CacheStats, usage: &DiskUsage) {
    for line in format_cache_stats(dir, stats, usage) {
        println!("{}", line);
    }
}

/// Format the outcome of a cache lookup.
pub fn format_cache_lookup(key: &str, found: Option<((u32, u32), &Path)>) -> Vec<String> {
    match found {
        Some(((w, h), output)) => vec![
            format!("{} → {}", key, file_name(output)),
            format!("{}Image: {}x{}", indent(1), w, h),
        ],
        None => vec![format!("{}: not cached", key)],
    }
}

pub fn print_cache_lookup(key: &str, found: Option<((u32, u32), &Path)>) {
    for line in format_cache_lookup(key, found) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
