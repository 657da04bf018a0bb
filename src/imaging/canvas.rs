//! Destination buffers for transform and filter operations.
//!
//! Every operation that produces new pixels allocates its output through
//! [`Canvas::new`], which takes the source [`RasterFormat`]. For PNG and GIF
//! the canvas starts fully transparent and pixels are copied in without
//! blending, so transparent regions survive the operation instead of turning
//! opaque black. Other formats get an opaque neutral background.

use super::raster::RasterFormat;
use image::{Rgba, RgbaImage, imageops};

/// Background for uncovered areas when the format cannot keep transparency.
const NEUTRAL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A destination buffer bound to the format of the image it will replace.
pub(crate) struct Canvas {
    buffer: RgbaImage,
    format: RasterFormat,
}

impl Canvas {
    pub(crate) fn new(format: RasterFormat, width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::from_pixel(width, height, background(format)),
            format,
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Copy `source` onto the canvas at `(x, y)`, replacing pixels outright.
    pub(crate) fn place(&mut self, source: &RgbaImage, x: i64, y: i64) {
        imageops::replace(&mut self.buffer, source, x, y);
    }

    pub(crate) fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        self.buffer.put_pixel(x, y, pixel);
    }

    /// Hand the finished buffer back. Formats without an alpha channel are
    /// flattened to opaque here so later encoders never see stray alpha.
    pub(crate) fn finish(mut self) -> RgbaImage {
        if self.format == RasterFormat::Jpeg {
            for pixel in self.buffer.pixels_mut() {
                pixel[3] = 255;
            }
        }
        self.buffer
    }
}

/// Fill colour for a freshly allocated buffer of `format`.
pub(crate) fn background(format: RasterFormat) -> Rgba<u8> {
    if format.keeps_transparency() {
        TRANSPARENT
    } else {
        NEUTRAL_BACKGROUND
    }
}
