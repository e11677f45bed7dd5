//! # Geometric Transform Engine
//!
//! Pure geometry for fitting a source rectangle inside a destination rectangle.
//! Distances are integer EMU (English Metric Units, 914400 per inch) on slides
//! and integer pixels for bitmaps; the engine does not care which.
pub mod contain;

pub use contain::compute_contain_transform;
pub use contain::AffineMatrix;
pub use contain::ScaleAxis;
pub use contain::TransformAudit;
pub use contain::TransformResult;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// EMU in one inch
pub const EMU_PER_INCH: i64 = 914_400;

/// EMU in one typographic point
pub const EMU_PER_POINT: i64 = 12_700;

/// Errors raised by geometric computations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid dimension: {what} is {width}x{height}")]
    InvalidDimension {
        what: &'static str,
        width: i64,
        height: i64,
    },
}

/// Axis-aligned rectangle in integer distance units.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    /// Creates a rectangle, rejecting negative extents.
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Result<Self, TransformError> {
        if width < 0 || height < 0 {
            return Err(TransformError::InvalidDimension { what: "rectangle", width, height });
        }
        Ok(Rect { x, y, width, height })
    }

    /// Rectangle at the origin with the given extents.
    pub fn sized(width: i64, height: i64) -> Result<Self, TransformError> {
        Self::new(0, 0, width, height)
    }

    /// Builds a rectangle from inch measurements, truncating toward zero.
    pub fn from_inches(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect {
            x: inches_to_emu(left),
            y: inches_to_emu(top),
            width: inches_to_emu(width).max(0),
            height: inches_to_emu(height).max(0),
        }
    }

    /// Width over height; undefined when the height is zero.
    pub fn aspect_ratio(&self) -> Result<f64, TransformError> {
        if self.height <= 0 || self.width < 0 {
            return Err(TransformError::InvalidDimension {
                what: "aspect ratio",
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.width as f64 / self.height as f64)
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }
}

/// Converts inches to EMU, truncating toward zero.
pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64) as i64
}

/// Converts points to EMU, truncating toward zero.
pub fn points_to_emu(points: f64) -> i64 {
    (points * EMU_PER_POINT as f64) as i64
}

/// Converts a pixel count at `dpi` into EMU, rounding to the nearest unit.
pub fn pixels_to_emu(pixels: u32, dpi: f64) -> i64 {
    (pixels as f64 / dpi * EMU_PER_INCH as f64).round() as i64
}
