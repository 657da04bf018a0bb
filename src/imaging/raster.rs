//! The in-memory raster image every transform works on.
//!
//! A [`RasterImage`] is decoded once from a working copy, mutated in place by
//! the transform and filter engine, and re-encoded on save. Pixels are held as
//! RGBA8 regardless of the source format so every operation has a single
//! pixel layout; the [`RasterFormat`] is remembered and never changes within a
//! manipulation session, and drives both transparency handling and encoding.
//!
//! ## Quality mapping
//!
//! | Format | Encoder parameter |
//! |---|---|
//! | JPEG | quality 1–100 as-is |
//! | WebP | quality 1–100 as-is (lossy, libwebp) |
//! | PNG | zlib level `round((100 - quality) / 10)` clamped to `0..=9` |
//! | GIF | quality ignored |

use super::backend::ImagingError;
use super::calculations::png_compression_level;
use super::canvas::Canvas;
use super::params::Quality;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// libwebp refuses anything larger on either axis.
const WEBP_MAX_DIMENSION: u32 = 16383;

/// Encoded formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl RasterFormat {
    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Whether newly allocated buffers start transparent for this format.
    ///
    /// Only PNG and GIF sources get transparent fills; everything else gets
    /// an opaque neutral background.
    pub fn keeps_transparency(self) -> bool {
        matches!(self, Self::Png | Self::Gif)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

/// A decoded image plus the format and quality it will be saved with.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: RgbaImage,
    format: RasterFormat,
    quality: Quality,
}

impl RasterImage {
    /// Decode an image from its encoded bytes.
    ///
    /// Fails with [`ImagingError::UnsupportedFormat`] when the bytes are not
    /// JPEG, PNG, GIF or WebP, and [`ImagingError::InvalidImage`] when the
    /// format is recognized but the data cannot be decoded into a non-empty
    /// image.
    pub fn load(bytes: &[u8]) -> Result<Self, ImagingError> {
        let format = image::guess_format(bytes)
            .ok()
            .and_then(RasterFormat::from_image_format)
            .ok_or(ImagingError::UnsupportedFormat)?;

        let decoded = image::load_from_memory_with_format(bytes, format.image_format())
            .map_err(|e| ImagingError::InvalidImage(format!("{} decode failed: {e}", format.name())))?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ImagingError::InvalidImage(
                "image has no pixels".to_string(),
            ));
        }

        Ok(Self::from_pixels(decoded.to_rgba8(), format))
    }

    /// Wrap an existing RGBA buffer.
    pub fn from_pixels(pixels: RgbaImage, format: RasterFormat) -> Self {
        Self {
            pixels,
            format,
            quality: Quality::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Start a destination buffer for an operation on this image.
    pub(crate) fn canvas(&self, width: u32, height: u32) -> Canvas {
        Canvas::new(self.format, width, height)
    }

    /// Swap in a finished destination buffer. This is the only place an
    /// operation mutates the image, so a failed operation leaves it untouched.
    pub(crate) fn commit(&mut self, canvas: Canvas) {
        self.pixels = canvas.finish();
    }

    /// Encode to bytes in the image's own format.
    ///
    /// `quality` overrides the image's working quality for this save only.
    pub fn save(&self, quality: Option<Quality>) -> Result<Vec<u8>, ImagingError> {
        let quality = quality.unwrap_or(self.quality).value();
        let (width, height) = self.dimensions();
        let mut buffer = Vec::new();

        match self.format {
            RasterFormat::Jpeg => {
                let rgb: RgbImage = self.pixels.convert();
                JpegEncoder::new_with_quality(&mut buffer, quality as u8)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| ImagingError::Encode(format!("JPEG encode failed: {e}")))?;
            }
            RasterFormat::Png => {
                let compression = match png_compression_level(quality) {
                    0 => CompressionType::Uncompressed,
                    level => CompressionType::Level(level),
                };
                PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive)
                    .write_image(self.pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| ImagingError::Encode(format!("PNG encode failed: {e}")))?;
            }
            RasterFormat::Gif => {
                self.pixels
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Gif)
                    .map_err(|e| ImagingError::Encode(format!("GIF encode failed: {e}")))?;
            }
            RasterFormat::WebP => {
                if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
                    return Err(ImagingError::Encode(format!(
                        "WebP encode failed: {width}x{height} exceeds {WEBP_MAX_DIMENSION}px"
                    )));
                }
                let encoded =
                    webp::Encoder::from_rgba(self.pixels.as_raw(), width, height).encode(quality as f32);
                buffer.extend_from_slice(&encoded);
            }
        }

        Ok(buffer)
    }
}
