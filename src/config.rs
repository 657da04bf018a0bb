//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `gallery-media.toml`. Stock
//! defaults are overridden by the user file, key by key.
//!
//! ## Config File Location
//!
//! Place `gallery-media.toml` in the directory passed as `--config-dir`
//! (defaults to the asset root):
//!
//! ```text
//! media/
//! ├── gallery-media.toml   # Overrides stock defaults
//! ├── original/
//! ├── pristine/
//! └── thumb/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [uploads]
//! allowed_mime_types = []   # Empty = allow all
//! allowed_extensions = []   # Empty = allow all
//! max_bytes = 0             # 0 = unlimited
//!
//! [thumbnails]
//! width = 300
//! height = 300
//!
//! [images]
//! quality = 90              # Encode quality (1-100)
//!
//! [video]
//! thumbnail_at = 1.0        # Seconds into the video
//! thumbnail_width = 320
//! # thumbnail_height = 180  # Omit to keep the video's aspect ratio
//! # ffmpeg_path = "/usr/bin/ffmpeg"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "gallery-media.toml";

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

/// Pipeline configuration loaded from `gallery-media.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Upload allow-lists and size limit.
    pub uploads: UploadsConfig,
    /// Thumbnail size for raster uploads.
    pub thumbnails: ThumbnailsConfig,
    /// Encode settings for working copies and thumbnails.
    pub images: ImagesConfig,
    /// Keyframe extraction settings.
    pub video: VideoConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl MediaConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.thumbnails.width == 0 || self.thumbnails.height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.width and thumbnails.height must be non-zero".into(),
            ));
        }
        if self.video.thumbnail_width == 0 || self.video.thumbnail_height == Some(0) {
            return Err(ConfigError::Validation(
                "video thumbnail dimensions must be non-zero".into(),
            ));
        }
        if !self.video.thumbnail_at.is_finite() || self.video.thumbnail_at < 0.0 {
            return Err(ConfigError::Validation(
                "video.thumbnail_at must be a non-negative number of seconds".into(),
            ));
        }
        Ok(())
    }
}

/// Upload validation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Accepted MIME types. Empty means no MIME restriction.
    pub allowed_mime_types: Vec<String>,
    /// Accepted file extensions, without the dot. Empty means no restriction.
    pub allowed_extensions: Vec<String>,
    /// Largest accepted upload in bytes. `0` disables the check.
    pub max_bytes: u64,
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
        }
    }
}

/// Image encode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Encode quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

/// Video keyframe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoConfig {
    /// Seconds into the video to grab the keyframe from.
    pub thumbnail_at: f64,
    pub thumbnail_width: u32,
    /// When absent, height follows the video's aspect ratio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
    /// Probed before the built-in list of install locations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            thumbnail_at: 1.0,
            thumbnail_width: 320,
            thumbnail_height: None,
            ffmpeg_path: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
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

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MediaConfig::default())?)
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

/// Load `gallery-media.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
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
) -> Result<MediaConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MediaConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `gallery-media.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<MediaConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `gallery-media.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Media Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Upload validation
# ---------------------------------------------------------------------------
[uploads]
# An upload is accepted when EITHER its MIME type OR its extension is listed.
# An empty list places no restriction on that check.
allowed_mime_types = []
allowed_extensions = []

# Largest accepted upload in bytes. 0 = unlimited.
max_bytes = 0

# ---------------------------------------------------------------------------
# Thumbnails (cover-and-crop, always exactly this size)
# ---------------------------------------------------------------------------
[thumbnails]
width = 300
height = 300

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[images]
# Quality for JPEG and WebP (1-100). PNG maps it to a compression level
# (100 = uncompressed, 10 = level 9). GIF ignores it.
quality = 90

# ---------------------------------------------------------------------------
# Video keyframes (requires ffmpeg; videos ingest without a thumbnail when
# it is missing)
# ---------------------------------------------------------------------------
[video]
# Seconds into the video. Requests past the end use the midpoint.
thumbnail_at = 1.0
thumbnail_width = 320
# Set to crop to an exact size; omit to keep the video's aspect ratio.
# thumbnail_height = 180
# Checked before the standard install locations.
# ffmpeg_path = "/usr/local/bin/ffmpeg"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for rebuild-thumbs. Omit for auto (= CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}
