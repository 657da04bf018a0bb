//! Per-pixel filters: grayscale, brightness, contrast, sharpen, color overlay.
//!
//! The numeric curves are fixed so the same level always yields the same
//! pixel values. Every filter leaves alpha untouched.

use super::raster::RasterImage;
use image::{Rgba, RgbaImage};

pub const BRIGHTNESS_RANGE: (i32, i32) = (-255, 255);
pub const CONTRAST_RANGE: (i32, i32) = (-100, 100);

/// 3x3 sharpen kernel, divisor 1, offset 0.
const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

impl RasterImage {
    /// Desaturate to `0.299 R + 0.587 G + 0.114 B`, truncated.
    pub fn grayscale(&mut self) {
        self.map_pixels(|[r, g, b, a]| {
            let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
            let luma = luma as u8;
            [luma, luma, luma, a]
        });
    }

    /// Add `level` (clamped to -255..=255) to every color channel.
    pub fn brightness(&mut self, level: i32) {
        let level = level.clamp(BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1);
        self.map_pixels(|[r, g, b, a]| {
            let shift = |c: u8| (c as i32 + level).clamp(0, 255) as u8;
            [shift(r), shift(g), shift(b), a]
        });
    }

    /// Scale channels around mid-gray.
    ///
    /// `level` is clamped to -100..=100; negative values increase contrast,
    /// positive values flatten it, `100` collapses everything to mid-gray.
    pub fn contrast(&mut self, level: i32) {
        let level = level.clamp(CONTRAST_RANGE.0, CONTRAST_RANGE.1);
        let factor = ((100.0 - level as f64) / 100.0).powi(2);
        self.map_pixels(|[r, g, b, a]| {
            let adjust = |c: u8| {
                let value = ((c as f64 / 255.0 - 0.5) * factor + 0.5) * 255.0;
                value.clamp(0.0, 255.0) as u8
            };
            [adjust(r), adjust(g), adjust(b), a]
        });
    }

    /// Convolve color channels with the 3x3 sharpen kernel. Pixels past the
    /// border replicate the nearest edge pixel.
    pub fn sharpen(&mut self) {
        let source = self.pixels();
        let (width, height) = source.dimensions();
        let mut canvas = self.canvas(width, height);

        for y in 0..height {
            for x in 0..width {
                let mut sums = [0i32; 3];
                for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                    for (kx, weight) in row.iter().enumerate() {
                        if *weight == 0 {
                            continue;
                        }
                        let px = neighbor(x, kx, width);
                        let py = neighbor(y, ky, height);
                        let pixel = source.get_pixel(px, py);
                        for (c, sum) in sums.iter_mut().enumerate() {
                            *sum += pixel[c] as i32 * weight;
                        }
                    }
                }
                let alpha = source.get_pixel(x, y)[3];
                let [r, g, b] = sums.map(|s| s.clamp(0, 255) as u8);
                canvas.put_pixel(x, y, Rgba([r, g, b, alpha]));
            }
        }

        self.commit(canvas);
    }

    /// Blend a flat color over every pixel: `orig * (1 - a) + color * a`.
    ///
    /// `a = clamp(opacity_percent, 0, 100) / 100`; color components clamp to
    /// `0..=255`. Results are truncated, not rounded.
    pub fn color_overlay(&mut self, red: i32, green: i32, blue: i32, opacity_percent: f64) {
        let alpha = if opacity_percent.is_nan() {
            0.0
        } else {
            opacity_percent.clamp(0.0, 100.0) / 100.0
        };
        let overlay = [red, green, blue].map(|c| c.clamp(0, 255) as f64);
        self.map_pixels(|[r, g, b, a]| {
            let blend = |orig: u8, color: f64| {
                (orig as f64 * (1.0 - alpha) + color * alpha).clamp(0.0, 255.0) as u8
            };
            [
                blend(r, overlay[0]),
                blend(g, overlay[1]),
                blend(b, overlay[2]),
                a,
            ]
        });
    }

    fn map_pixels(&mut self, f: impl Fn([u8; 4]) -> [u8; 4]) {
        let source: &RgbaImage = self.pixels();
        let (width, height) = source.dimensions();
        let mut canvas = self.canvas(width, height);
        for (x, y, pixel) in source.enumerate_pixels() {
            canvas.put_pixel(x, y, Rgba(f(pixel.0)));
        }
        self.commit(canvas);
    }
}

/// Coordinate of kernel tap `k` (0..3) around `center`, clamped to the image.
fn neighbor(center: u32, k: usize, limit: u32) -> u32 {
    (center as i64 + k as i64 - 1).clamp(0, limit as i64 - 1) as u32
}
