//! Contain-fit: uniform scale that fits a source inside a destination box, centered.
//!
//! Scaled extents are rounded half away from zero (`f64::round`) and the centering
//! offset uses floor division, so a placement is reproducible bit for bit.
use crate::transform::Rect;
use crate::transform::TransformError;
use serde::Serialize;

/// Which destination extent bounded the scale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleAxis {
    Width,
    Height,
}

impl ScaleAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleAxis::Width => "width",
            ScaleAxis::Height => "height",
        }
    }
}

/// Homogeneous 2D affine matrix, row major.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct AffineMatrix(pub [[f64; 3]; 3]);

impl AffineMatrix {
    /// Uniform scale followed by a translation.
    pub fn scale_translate(scale: f64, tx: f64, ty: f64) -> Self {
        AffineMatrix([[scale, 0.0, tx], [0.0, scale, ty], [0.0, 0.0, 1.0]])
    }

    /// Maps a source point into destination space.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        (
            (m[0][0] * x + m[0][1] * y + m[0][2]) / w,
            (m[1][0] * x + m[1][1] * y + m[1][2]) / w,
        )
    }
}

/// Outcome of a contain-fit computation. Immutable once computed.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformResult {
    pub source_width: i64,
    pub source_height: i64,
    pub destination: Rect,
    pub r_content: f64,
    pub r_box: f64,
    pub scale_factor: f64,
    pub scale_axis: ScaleAxis,
    pub matrix: AffineMatrix,
    /// Final placed rectangle in destination space
    pub placed: Rect,
    /// Offset of the placed rectangle from the destination origin
    pub tx: i64,
    pub ty: i64,
}

/// Computes the uniform-scale, centered transform that contains `source` inside `destination`.
///
/// Only the source extents are used; its position is ignored.
///
/// # Arguments
/// * `source` - Rectangle to fit, both extents must be positive
/// * `destination` - Box to fit into, its height must be positive
///
/// # Returns
/// The transform with the placed rectangle, or `InvalidDimension`
///
/// # Examples
/// ```
/// use rusty_deck::transform::{compute_contain_transform, Rect, ScaleAxis};
/// let source = Rect::sized(2000, 1000).unwrap();
/// let destination = Rect::new(500, 500, 1000, 1000).unwrap();
/// let result = compute_contain_transform(&source, &destination).unwrap();
/// assert_eq!(result.scale_axis, ScaleAxis::Width);
/// assert_eq!((result.placed.width, result.placed.height, result.ty), (1000, 500, 250));
/// ```
pub fn compute_contain_transform(source: &Rect, destination: &Rect) -> Result<TransformResult, TransformError> {
    if source.width <= 0 || source.height <= 0 {
        return Err(TransformError::InvalidDimension {
            what: "source",
            width: source.width,
            height: source.height,
        });
    }
    if destination.width < 0 {
        return Err(TransformError::InvalidDimension {
            what: "destination",
            width: destination.width,
            height: destination.height,
        });
    }

    let r_content = source.aspect_ratio()?;
    let r_box = destination.aspect_ratio()?;

    // A tie takes the height branch; both branches scale identically there.
    let (scale_factor, scale_axis) = if r_content > r_box {
        (destination.width as f64 / source.width as f64, ScaleAxis::Width)
    } else {
        (destination.height as f64 / source.height as f64, ScaleAxis::Height)
    };

    let scaled_width = (scale_factor * source.width as f64).round() as i64;
    let scaled_height = (scale_factor * source.height as f64).round() as i64;
    let tx = (destination.width - scaled_width).div_euclid(2);
    let ty = (destination.height - scaled_height).div_euclid(2);
    let placed = Rect {
        x: destination.x + tx,
        y: destination.y + ty,
        width: scaled_width,
        height: scaled_height,
    };

    Ok(TransformResult {
        source_width: source.width,
        source_height: source.height,
        destination: *destination,
        r_content,
        r_box,
        scale_factor,
        scale_axis,
        matrix: AffineMatrix::scale_translate(scale_factor, placed.x as f64, placed.y as f64),
        placed,
        tx,
        ty,
    })
}

impl TransformResult {
    /// Maps a point given in source pixels to destination space.
    pub fn apply_to_point(&self, x: f64, y: f64) -> (f64, f64) {
        self.matrix.apply(x, y)
    }

    /// Plain, JSON-ready view of this transform.
    pub fn to_audit(&self) -> TransformAudit {
        TransformAudit {
            source: Extent { width: self.source_width, height: self.source_height },
            placeholder: self.destination,
            r_content: round6(self.r_content),
            r_box: round6(self.r_box),
            scale_factor: round6(self.scale_factor),
            scale_axis: self.scale_axis,
            affine_matrix: self.matrix.0,
            destination: self.placed,
            translation: Translation { tx: self.tx, ty: self.ty },
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Serialized form of a transform as stored in the audit trail.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransformAudit {
    pub source: Extent,
    pub placeholder: Rect,
    pub r_content: f64,
    pub r_box: f64,
    pub scale_factor: f64,
    pub scale_axis: ScaleAxis,
    pub affine_matrix: [[f64; 3]; 3],
    pub destination: Rect,
    pub translation: Translation,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Extent {
    pub width: i64,
    pub height: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Translation {
    pub tx: i64,
    pub ty: i64,
}
