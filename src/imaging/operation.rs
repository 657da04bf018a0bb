//! The single named operation a "manipulate" request applies.
//!
//! [`Operation`] deserializes from tagged JSON such as
//! `{"operation": "resize", "width": 800, "height": 600}`; callers that hold
//! loose parameters (query strings, CLI flags) go through
//! [`Operation::from_request`] instead. Dimensions stay signed until
//! [`Operation::apply`] so non-positive sizes surface as
//! [`ImagingError::InvalidDimensions`] rather than a parse failure.

use super::backend::ImagingError;
use super::raster::RasterImage;
use serde::{Deserialize, Serialize};

/// Names accepted by [`Operation::from_request`], in documentation order.
pub const OPERATION_NAMES: &[&str] = &[
    "resize",
    "crop",
    "thumbnail",
    "rotate",
    "flip_horizontal",
    "flip_vertical",
    "grayscale",
    "brightness",
    "contrast",
    "sharpen",
    "color_overlay",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    Resize {
        width: i64,
        height: i64,
        #[serde(default = "default_maintain_aspect")]
        maintain_aspect: bool,
    },
    Crop {
        width: i64,
        height: i64,
        #[serde(default)]
        x: Option<i64>,
        #[serde(default)]
        y: Option<i64>,
    },
    Thumbnail {
        width: i64,
        height: i64,
    },
    Rotate {
        degrees: f64,
    },
    FlipHorizontal,
    FlipVertical,
    Grayscale,
    Brightness {
        level: i32,
    },
    Contrast {
        level: i32,
    },
    Sharpen,
    ColorOverlay {
        red: i32,
        green: i32,
        blue: i32,
        opacity: f64,
    },
}

fn default_maintain_aspect() -> bool {
    true
}

/// Loose numeric parameters for [`Operation::from_request`].
///
/// Which fields are required depends on the operation name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OperationParams {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub maintain_aspect: Option<bool>,
    pub degrees: Option<f64>,
    pub level: Option<i32>,
    pub red: Option<i32>,
    pub green: Option<i32>,
    pub blue: Option<i32>,
    pub opacity: Option<f64>,
}

fn required<T>(value: Option<T>, operation: &str, field: &str) -> Result<T, ImagingError> {
    value.ok_or_else(|| ImagingError::InvalidParameter(format!("{operation} requires {field}")))
}

impl Operation {
    /// Build an operation from its name and loose parameters.
    pub fn from_request(name: &str, params: &OperationParams) -> Result<Self, ImagingError> {
        let op = match name {
            "resize" => Self::Resize {
                width: required(params.width, name, "width")?,
                height: required(params.height, name, "height")?,
                maintain_aspect: params.maintain_aspect.unwrap_or(true),
            },
            "crop" => Self::Crop {
                width: required(params.width, name, "width")?,
                height: required(params.height, name, "height")?,
                x: params.x,
                y: params.y,
            },
            "thumbnail" => Self::Thumbnail {
                width: required(params.width, name, "width")?,
                height: required(params.height, name, "height")?,
            },
            "rotate" => Self::Rotate {
                degrees: required(params.degrees, name, "degrees")?,
            },
            "flip_horizontal" => Self::FlipHorizontal,
            "flip_vertical" => Self::FlipVertical,
            "grayscale" => Self::Grayscale,
            "brightness" => Self::Brightness {
                level: required(params.level, name, "level")?,
            },
            "contrast" => Self::Contrast {
                level: required(params.level, name, "level")?,
            },
            "sharpen" => Self::Sharpen,
            "color_overlay" => Self::ColorOverlay {
                red: required(params.red, name, "red")?,
                green: required(params.green, name, "green")?,
                blue: required(params.blue, name, "blue")?,
                opacity: required(params.opacity, name, "opacity")?,
            },
            other => {
                return Err(ImagingError::InvalidParameter(format!(
                    "unknown operation '{other}' (expected one of: {})",
                    OPERATION_NAMES.join(", ")
                )));
            }
        };
        Ok(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Crop { .. } => "crop",
            Self::Thumbnail { .. } => "thumbnail",
            Self::Rotate { .. } => "rotate",
            Self::FlipHorizontal => "flip_horizontal",
            Self::FlipVertical => "flip_vertical",
            Self::Grayscale => "grayscale",
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Sharpen => "sharpen",
            Self::ColorOverlay { .. } => "color_overlay",
        }
    }

    /// Apply this operation to `image`. On error the image is unchanged.
    pub fn apply(&self, image: &mut RasterImage) -> Result<(), ImagingError> {
        match *self {
            Self::Resize {
                width,
                height,
                maintain_aspect,
            } => {
                let (w, h) = positive_dimensions(width, height)?;
                image.resize(w, h, maintain_aspect)
            }
            Self::Crop {
                width,
                height,
                x,
                y,
            } => {
                let (w, h) = positive_dimensions(width, height)?;
                image.crop(w, h, x.map(origin), y.map(origin)).map(|_| ())
            }
            Self::Thumbnail { width, height } => {
                let (w, h) = positive_dimensions(width, height)?;
                image.thumbnail(w, h)
            }
            Self::Rotate { degrees } => image.rotate(degrees),
            Self::FlipHorizontal => {
                image.flip_horizontal();
                Ok(())
            }
            Self::FlipVertical => {
                image.flip_vertical();
                Ok(())
            }
            Self::Grayscale => {
                image.grayscale();
                Ok(())
            }
            Self::Brightness { level } => {
                image.brightness(level);
                Ok(())
            }
            Self::Contrast { level } => {
                image.contrast(level);
                Ok(())
            }
            Self::Sharpen => {
                image.sharpen();
                Ok(())
            }
            Self::ColorOverlay {
                red,
                green,
                blue,
                opacity,
            } => {
                image.color_overlay(red, green, blue, opacity);
                Ok(())
            }
        }
    }
}

fn positive_dimensions(width: i64, height: i64) -> Result<(u32, u32), ImagingError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ImagingError::InvalidDimensions { width, height }),
    }
}

/// Negative origins are treated as the image edge.
fn origin(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
