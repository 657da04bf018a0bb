//! High-level image operations.
//!
//! These functions combine configuration with backend execution: they decide
//! the parameters and hand the pixel work to an [`ImageBackend`].

use super::backend::{Dimensions, ImageBackend, ImagingError};
use super::operation::Operation;
use super::params::{ManipulateParams, Quality, ThumbnailParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Configuration for thumbnail generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailConfig {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            quality: Quality::default(),
        }
    }
}

/// Plan a thumbnail operation without executing it.
pub fn plan_thumbnail(source: &Path, output: &Path, config: &ThumbnailConfig) -> ThumbnailParams {
    ThumbnailParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width: config.width,
        height: config.height,
        quality: config.quality,
    }
}

/// Create a thumbnail image at `output` from `source`.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    config: &ThumbnailConfig,
) -> Result<Dimensions> {
    let params = plan_thumbnail(source, output, config);
    backend.thumbnail(&params)
}

/// Apply one operation to the working copy at `path`, saving at `quality`.
pub fn apply_operation(
    backend: &impl ImageBackend,
    path: &Path,
    operation: Operation,
    quality: Quality,
) -> Result<Dimensions> {
    backend.manipulate(&ManipulateParams {
        path: path.to_path_buf(),
        operation,
        quality,
    })
}
