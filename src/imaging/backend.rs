//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three file-level operations the
//! asset lifecycle needs: identify, thumbnail, and manipulate.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), which decodes into a
//! [`RasterImage`](super::RasterImage) and runs the transform engine on it.
//! Tests use the recording [`MockBackend`](tests::MockBackend), which can also
//! be told to fail so rollback paths are exercised without corrupt files.

use super::params::{ManipulateParams, ThumbnailParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ImagingError {
    /// True for the decode half of the taxonomy (unsupported or corrupt input).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::UnsupportedFormat | Self::InvalidImage(_))
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// Every call is synchronous and owns whatever it decodes; nothing is cached
/// between calls. Callers must serialize calls that touch the same file.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError>;

    /// Write an exact-size cover-and-crop thumbnail of `source` to `output`.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, ImagingError>;

    /// Apply one operation to a working copy and overwrite it in place.
    fn manipulate(&self, params: &ManipulateParams) -> Result<Dimensions, ImagingError>;
}
