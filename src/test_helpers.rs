//! Shared test utilities for the gallery-media test suite.
//!
//! Provides synthetic pixel sources, encoded fixtures, and a temp asset root
//! laid out the way [`AssetLayout`](crate::storage::AssetLayout) expects.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, layout) = setup_layout();
//! let path = write_test_image(tmp.path(), "photo.png", RasterFormat::Png, 64, 48);
//! ```

use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::imaging::{RasterFormat, RasterImage};
use crate::storage::AssetLayout;

// =========================================================================
// Pixel sources
// =========================================================================

/// Opaque gradient where every pixel differs from its neighbours, so crops
/// and flips can be checked by sampling.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

/// Encode a [`gradient`] in `format` at the default quality.
pub fn encode_test_image(format: RasterFormat, width: u32, height: u32) -> Vec<u8> {
    RasterImage::from_pixels(gradient(width, height), format)
        .save(None)
        .unwrap()
}

/// Encode a test image and write it to `dir/name`.
pub fn write_test_image(
    dir: &Path,
    name: &str,
    format: RasterFormat,
    width: u32,
    height: u32,
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_test_image(format, width, height)).unwrap();
    path
}

// =========================================================================
// Asset root fixtures
// =========================================================================

/// Temp asset root with its layout. Directories are not created up front;
/// ingestion is expected to do that.
pub fn setup_layout() -> (TempDir, AssetLayout) {
    let tmp = TempDir::new().unwrap();
    let layout = AssetLayout::new(tmp.path());
    (tmp, layout)
}

/// Names of the regular files directly under `dir`, sorted. Empty when the
/// directory does not exist.
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
