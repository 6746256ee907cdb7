//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user `config.toml` in the config directory overrides any
//! subset of keys.
//!
//! Every option with its default and an explanation is in
//! [`stock_config_toml`] (`cropkeep gen-config`).
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [upload]
//! quality = 90
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::{self, CacheLimits};
use crate::crop::CropLayout;
use crate::imaging::{Quality, UploadParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Crop frame layout and zoom range.
    pub crop: CropConfig,
    /// Shape and encoding of uploaded variants.
    pub upload: UploadConfig,
    /// Two-tier image cache bounds and location.
    pub cache: CacheConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let crop = &self.crop;
        if crop.aspect_ratio[0] == 0 || crop.aspect_ratio[1] == 0 {
            return Err(ConfigError::Validation(
                "crop.aspect_ratio values must be non-zero".into(),
            ));
        }
        if !(crop.margin_x.is_finite() && crop.margin_x >= 0.0)
            || !(crop.margin_y.is_finite() && crop.margin_y >= 0.0)
        {
            return Err(ConfigError::Validation(
                "crop.margin_x and crop.margin_y must be finite and non-negative".into(),
            ));
        }
        if !(crop.min_scale.is_finite() && crop.min_scale > 0.0)
            || !crop.max_scale.is_finite()
            || crop.min_scale > crop.max_scale
        {
            return Err(ConfigError::Validation(
                "crop scales must satisfy 0 < min_scale <= max_scale".into(),
            ));
        }
        if !(1..=100).contains(&self.upload.quality) {
            return Err(ConfigError::Validation(
                "upload.quality must be 1-100".into(),
            ));
        }
        if self.upload.max_width == 0 {
            return Err(ConfigError::Validation(
                "upload.max_width must be positive".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be positive".into(),
            ));
        }
        if self.cache.max_cost_bytes == 0 {
            return Err(ConfigError::Validation(
                "cache.max_cost_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Crop frame layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Aspect ratio as `[width, height]`.
    pub aspect_ratio: [u32; 2],
    pub margin_x: f64,
    pub margin_y: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        let layout = CropLayout::default();
        Self {
            aspect_ratio: layout.aspect_ratio,
            margin_x: layout.margin_x,
            margin_y: layout.margin_y,
            min_scale: layout.min_scale,
            max_scale: layout.max_scale,
        }
    }
}

impl CropConfig {
    pub fn layout(&self) -> CropLayout {
        CropLayout {
            aspect_ratio: self.aspect_ratio,
            margin_x: self.margin_x,
            margin_y: self.margin_y,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
        }
    }
}

/// Upload variant settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub max_width: u32,
    /// JPEG quality (1-100).
    pub quality: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let params = UploadParams::default();
        Self {
            max_width: params.max_width,
            quality: params.quality.value() as u32,
        }
    }
}

impl UploadConfig {
    pub fn params(&self) -> UploadParams {
        UploadParams {
            max_width: self.max_width,
            quality: Quality::new(self.quality),
        }
    }
}

/// Image cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_cost_bytes: usize,
    /// Disk tier location. When absent, the platform cache directory is used.
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let limits = CacheLimits::default();
        Self {
            max_entries: limits.max_entries,
            max_cost_bytes: limits.max_cost_bytes,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn limits(&self) -> CacheLimits {
        CacheLimits {
            max_entries: self.max_entries,
            max_cost_bytes: self.max_cost_bytes,
            ..CacheLimits::default()
        }
    }

    /// Configured directory, else the platform default.
    pub fn resolve_directory(&self) -> Option<PathBuf> {
        self.directory.clone().or_else(cache::default_directory)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# cropkeep Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Crop frame
# ---------------------------------------------------------------------------
[crop]
# Aspect ratio of the crop frame as [width, height].
aspect_ratio = [4, 3]

# Total margin between the frame and the container edges, in points.
# The frame is centered, so half of each margin lands on either side.
margin_x = 40.0
margin_y = 160.0

# Zoom range. Pinch gestures are clamped into [min_scale, max_scale].
min_scale = 1.0
max_scale = 5.0

# ---------------------------------------------------------------------------
# Upload variants
# ---------------------------------------------------------------------------
[upload]
# Variants wider than this are downscaled before upload (never upscaled).
max_width = 1200

# JPEG encoding quality (1 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Image cache
# ---------------------------------------------------------------------------
[cache]
# Memory tier ceilings. Least-recently-used entries are evicted once
# either is exceeded. Cost is the decoded size: width * height * 4 bytes.
max_entries = 100
max_cost_bytes = 52428800

# Disk tier directory.
# Omit or comment out to use <platform cache dir>/cropkeep/ImageCache.
# directory = "/var/cache/cropkeep"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
