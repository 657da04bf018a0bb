//! Geometric transforms: resize, crop, thumbnail, rotate, flip.
//!
//! Each method validates its input, renders into a fresh [`Canvas`] and only
//! then commits it, so an error never leaves the image half-transformed.

use super::backend::ImagingError;
use super::calculations::{
    calculate_aspect_dimensions, calculate_fill_dimensions, calculate_rotated_bounds,
};
use super::canvas::Canvas;
use super::params::Region;
use super::raster::RasterImage;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Resampling filter for every size change.
const RESAMPLE: FilterType = FilterType::Lanczos3;

/// Angles closer than this to a multiple of 90° use exact pixel permutation.
const RIGHT_ANGLE_EPSILON: f64 = 1e-9;

/// Largest buffer a transform may allocate, in pixels (400 MB of RGBA8).
pub(crate) const MAX_PIXELS: u64 = 100_000_000;

pub(crate) fn ensure_positive(width: u32, height: u32) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidDimensions {
            width: width.into(),
            height: height.into(),
        });
    }
    Ok(())
}

/// Reject buffer sizes the allocator would abort on instead of failing.
pub(crate) fn ensure_allocatable(width: u32, height: u32) -> Result<(), ImagingError> {
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(ImagingError::InvalidDimensions {
            width: width.into(),
            height: height.into(),
        });
    }
    Ok(())
}

impl RasterImage {
    /// Resize to `width x height`, or into that box when `maintain_aspect`.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        maintain_aspect: bool,
    ) -> Result<(), ImagingError> {
        ensure_positive(width, height)?;
        let (width, height) = if maintain_aspect {
            calculate_aspect_dimensions(self.dimensions(), (width, height))
        } else {
            (width, height)
        };
        ensure_allocatable(width, height)?;

        let resized = imageops::resize(self.pixels(), width, height, RESAMPLE);
        let mut canvas = self.canvas(width, height);
        canvas.place(&resized, 0, 0);
        self.commit(canvas);
        Ok(())
    }

    /// Copy a region into a new buffer. A missing origin centers the region.
    pub fn crop(
        &mut self,
        width: u32,
        height: u32,
        x: Option<u32>,
        y: Option<u32>,
    ) -> Result<Region, ImagingError> {
        ensure_positive(width, height)?;
        let region = Region::resolve(self.dimensions(), width, height, x, y);

        let cropped = crop_region(self.pixels(), region);
        let mut canvas = self.canvas(region.width, region.height);
        canvas.place(&cropped, 0, 0);
        self.commit(canvas);
        Ok(region)
    }

    /// Cover-and-crop to exactly `width x height`.
    ///
    /// The image is scaled so it covers the target box (one side matches, the
    /// other overflows), then the overflow is trimmed evenly from both ends.
    /// Output dimensions are exact for any input aspect ratio.
    pub fn thumbnail(&mut self, width: u32, height: u32) -> Result<(), ImagingError> {
        ensure_positive(width, height)?;
        let (fill_w, fill_h) = calculate_fill_dimensions(self.dimensions(), (width, height));
        ensure_allocatable(fill_w, fill_h)?;

        let filled = imageops::resize(self.pixels(), fill_w, fill_h, RESAMPLE);
        let region = Region::resolve((fill_w, fill_h), width, height, None, None);
        let cropped = crop_region(&filled, region);

        let mut canvas = self.canvas(width, height);
        canvas.place(&cropped, 0, 0);
        self.commit(canvas);
        Ok(())
    }

    /// Rotate counter-clockwise by `degrees`; the canvas grows to the
    /// bounding box of the rotated content.
    pub fn rotate(&mut self, degrees: f64) -> Result<(), ImagingError> {
        if !degrees.is_finite() {
            return Err(ImagingError::InvalidParameter(format!(
                "rotation angle must be finite, got {degrees}"
            )));
        }
        let turn = degrees.rem_euclid(360.0);
        let quarter = (turn / 90.0).round();

        if (turn - quarter * 90.0).abs() < RIGHT_ANGLE_EPSILON {
            let rotated = match quarter as u32 % 4 {
                0 => return Ok(()),
                1 => imageops::rotate270(self.pixels()),
                2 => imageops::rotate180(self.pixels()),
                _ => imageops::rotate90(self.pixels()),
            };
            let (w, h) = rotated.dimensions();
            let mut canvas = self.canvas(w, h);
            canvas.place(&rotated, 0, 0);
            self.commit(canvas);
            return Ok(());
        }

        let (width, height) = calculate_rotated_bounds(self.width(), self.height(), turn);
        ensure_allocatable(width, height)?;
        let mut canvas = self.canvas(width, height);
        rotate_onto(self.pixels(), &mut canvas, turn.to_radians());
        self.commit(canvas);
        Ok(())
    }

    pub fn flip_horizontal(&mut self) {
        let flipped = imageops::flip_horizontal(self.pixels());
        let mut canvas = self.canvas(flipped.width(), flipped.height());
        canvas.place(&flipped, 0, 0);
        self.commit(canvas);
    }

    pub fn flip_vertical(&mut self) {
        let flipped = imageops::flip_vertical(self.pixels());
        let mut canvas = self.canvas(flipped.width(), flipped.height());
        canvas.place(&flipped, 0, 0);
        self.commit(canvas);
    }
}

fn crop_region(source: &RgbaImage, region: Region) -> RgbaImage {
    imageops::crop_imm(source, region.x, region.y, region.width, region.height).to_image()
}

/// Inverse-map every canvas pixel back into the source and sample it.
/// Canvas pixels that land outside the source keep the canvas background.
fn rotate_onto(source: &RgbaImage, canvas: &mut Canvas, radians: f64) {
    let (src_w, src_h) = source.dimensions();
    let (dst_w, dst_h) = canvas.dimensions();
    let (sin, cos) = radians.sin_cos();
    let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f64 / 2.0, dst_h as f64 / 2.0);

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let u = dx as f64 + 0.5 - dst_cx;
            let v = dy as f64 + 0.5 - dst_cy;
            let sx = u * cos - v * sin + src_cx;
            let sy = u * sin + v * cos + src_cy;
            if sx < 0.0 || sy < 0.0 || sx >= src_w as f64 || sy >= src_h as f64 {
                continue;
            }
            canvas.put_pixel(dx, dy, sample_bilinear(source, sx - 0.5, sy - 0.5));
        }
    }
}

fn sample_bilinear(source: &RgbaImage, fx: f64, fy: f64) -> Rgba<u8> {
    let (w, h) = source.dimensions();
    let fx = fx.max(0.0);
    let fy = fy.max(0.0);
    let x0 = (fx.floor() as u32).min(w - 1);
    let y0 = (fy.floor() as u32).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = (fx - x0 as f64).clamp(0.0, 1.0);
    let ty = (fy - y0 as f64).clamp(0.0, 1.0);

    let p00 = source.get_pixel(x0, y0);
    let p10 = source.get_pixel(x1, y0);
    let p01 = source.get_pixel(x0, y1);
    let p11 = source.get_pixel(x1, y1);

    let mut out = [0u8; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        *value = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
