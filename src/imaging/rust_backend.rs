//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate via [`RasterImage::load`] |
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Resize / thumbnail | `image::imageops::resize` with `Lanczos3` |
//! | Filters | in-crate [`filters`](super::filters) |
//! | Encode JPEG / PNG / GIF | `image` crate encoders |
//! | Encode WebP (lossy) | `webp` (libwebp) |

use super::backend::{Dimensions, ImageBackend, ImagingError};
use super::params::{ManipulateParams, ThumbnailParams};
use super::raster::RasterImage;
use image::ImageReader;
use std::path::{Path, PathBuf};

/// Extensions the backend can decode and re-encode.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Returns the set of image file extensions the backend handles.
pub fn supported_input_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

/// Whether `path` has one of [`supported_input_extensions`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Pure Rust backend built on [`RasterImage`].
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<RasterImage, ImagingError> {
    let bytes = std::fs::read(path)?;
    RasterImage::load(&bytes)
}

/// Write through a sibling temp file and rename, so readers never see a
/// half-written image.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), ImagingError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if let Err(e) = std::fs::write(&partial, bytes).and_then(|_| std::fs::rename(&partial, path)) {
        let _ = std::fs::remove_file(&partial);
        return Err(ImagingError::Io(e));
    }
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                ImagingError::InvalidImage(format!(
                    "Failed to read dimensions of {}: {e}",
                    path.display()
                ))
            })?;
        Ok(Dimensions { width, height })
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, ImagingError> {
        let mut image = load_image(&params.source)?;
        image.thumbnail(params.width, params.height)?;
        let bytes = image.save(Some(params.quality))?;
        write_replacing(&params.output, &bytes)?;
        Ok(image.dimensions().into())
    }

    fn manipulate(&self, params: &ManipulateParams) -> Result<Dimensions, ImagingError> {
        let mut image = load_image(&params.path)?;
        image.set_quality(params.quality);
        params.operation.apply(&mut image)?;
        let bytes = image.save(None)?;
        write_replacing(&params.path, &bytes)?;
        Ok(image.dimensions().into())
    }
}
