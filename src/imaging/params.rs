//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the asset lifecycle (which decides which file gets which
//! treatment) and the [`backend`](super::backend) (which does the actual pixel
//! work). Keeping them plain data lets tests swap in a mock backend without
//! touching the lifecycle logic.
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality (1–100, default 90). Clamped on construction.
//! - [`Region`]: Rectangular sub-area addressed by origin and extent.
//! - [`ThumbnailParams`]: Source, output, exact thumbnail dimensions, quality.
//! - [`ManipulateParams`]: Working copy path, one [`Operation`](super::Operation), quality.

use super::operation::Operation;
use std::path::PathBuf;

/// Quality setting for image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// A rectangle inside a parent image.
///
/// After [`Region::resolve`] the region always satisfies
/// `x + width <= parent_width` and `y + height <= parent_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Resolve a requested crop against its parent.
    ///
    /// The extent is clamped to the parent first; a missing origin centers the
    /// region (`round((parent - extent) / 2)`), an explicit one is pulled back
    /// so the region stays in bounds.
    pub fn resolve(
        parent: (u32, u32),
        width: u32,
        height: u32,
        x: Option<u32>,
        y: Option<u32>,
    ) -> Self {
        let (parent_w, parent_h) = parent;
        let width = width.min(parent_w);
        let height = height.min(parent_h);
        let x = x
            .unwrap_or_else(|| super::calculations::center_offset(parent_w, width))
            .min(parent_w - width);
        let y = y
            .unwrap_or_else(|| super::calculations::center_offset(parent_h, height))
            .min(parent_h - height);
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Parameters for a thumbnail operation (cover-and-crop to exact size).
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// Parameters for a single in-place manipulation of a working copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulateParams {
    pub path: PathBuf,
    pub operation: Operation,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn region_defaults_to_center() {
        let region = Region::resolve((300, 300), 200, 200, None, None);
        assert_eq!(
            region,
            Region {
                x: 50,
                y: 50,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn region_center_rounds_half_up() {
        // (301 - 200) / 2 = 50.5 → 51
        let region = Region::resolve((301, 200), 200, 200, None, None);
        assert_eq!(region.x, 51);
        assert_eq!(region.y, 0);
    }

    #[test]
    fn region_explicit_origin_is_pulled_in_bounds() {
        let region = Region::resolve((300, 200), 100, 100, Some(250), Some(10));
        assert_eq!(region.x, 200);
        assert_eq!(region.y, 10);
    }

    #[test]
    fn region_extent_clamps_to_parent() {
        let region = Region::resolve((120, 80), 500, 500, Some(5), Some(5));
        assert_eq!(
            region,
            Region {
                x: 0,
                y: 0,
                width: 120,
                height: 80
            }
        );
    }
}
