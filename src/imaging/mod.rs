//! Image processing: decode, transform, filter, re-encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / identify** | `image` crate (JPEG, PNG, GIF, WebP) |
//! | **Resize / thumbnail** | Lanczos3 + center crop (cover-and-crop) |
//! | **Rotate** | exact quarter turns, bilinear otherwise |
//! | **Filters** | grayscale, brightness, contrast, 3x3 sharpen, color overlay |
//! | **Encode** | `image` (JPEG/PNG/GIF), `webp` (lossy WebP) |
//!
//! The module is split into:
//! - **Raster**: [`RasterImage`]: decoded pixels, format, working quality
//! - **Canvas**: transparency-aware destination buffers shared by every operation
//! - **Transform / Filters**: the engine, as methods on [`RasterImage`]
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining configuration + backend

pub mod backend;
pub mod calculations;
mod canvas;
pub mod filters;
pub mod operation;
pub mod operations;
pub mod params;
pub mod raster;
pub mod rust_backend;
mod transform;

pub use backend::{Dimensions, ImageBackend, ImagingError};
pub use operation::{OPERATION_NAMES, Operation, OperationParams};
pub use operations::{ThumbnailConfig, apply_operation, create_thumbnail, get_dimensions};
pub use params::{ManipulateParams, Quality, Region, ThumbnailParams};
pub use raster::{RasterFormat, RasterImage};
pub use rust_backend::RustBackend;
