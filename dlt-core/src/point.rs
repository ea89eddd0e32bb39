use crate::{DltError, Result};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix2xX, Matrix3xX, Matrix4xX, Point2, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Homogeneous scales with a magnitude below this are treated as points at infinity.
pub const HOMOGENEOUS_EPSILON: f64 = 1e-12;

/// An ordered set of calibration points lying on the reference plane `z = 0`.
///
/// The points are stored as the columns of a `2×N` matrix. Because nalgebra stores matrices
/// in column-major order, the raw storage is the flat coordinate vector
/// `(x1, y1, x2, y2, ...)` that the gradient code differentiates against.
#[derive(Debug, Clone, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ObjectPoints(pub Matrix2xX<f64>);

impl ObjectPoints {
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point2<f64>>,
    {
        let coordinates: Vec<f64> = points.into_iter().flat_map(|p| [p.x, p.y]).collect();
        Self(Matrix2xX::from_iterator(coordinates.len() / 2, coordinates))
    }

    /// Builds the point set from a flat `(x1, y1, x2, y2, ...)` slice.
    pub fn from_coordinates(coordinates: &[f64]) -> Result<Self> {
        if coordinates.len() % 2 != 0 {
            return Err(DltError::OddCoordinateCount(coordinates.len()));
        }
        Ok(Self(Matrix2xX::from_column_slice(coordinates)))
    }

    /// The flat `(x1, y1, x2, y2, ...)` coordinate vector.
    pub fn coordinates(&self) -> &[f64] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn point(&self, index: usize) -> Point2<f64> {
        Point2::from(self.0.column(index).into_owned())
    }

    pub fn points(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.0.column_iter().map(|c| Point2::new(c[0], c[1]))
    }

    /// The `4×N` homogeneous form `(x, y, 0, 1)` of the points.
    pub fn to_homogeneous(&self) -> Matrix4xX<f64> {
        let mut homogeneous = Matrix4xX::zeros(self.len());
        for (mut column, point) in homogeneous.column_iter_mut().zip(self.points()) {
            column[0] = point.x;
            column[1] = point.y;
            column[3] = 1.0;
        }
        homogeneous
    }

    /// The `3×N` planar homogeneous form `(x, y, 1)`, which is what a homography acts on.
    pub fn to_planar_homogeneous(&self) -> Matrix3xX<f64> {
        let mut homogeneous = Matrix3xX::from_element(self.len(), 1.0);
        homogeneous.fixed_rows_mut::<2>(0).copy_from(&self.0);
        homogeneous
    }

    /// Returns `true` if every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|n| n.is_finite())
    }
}

/// Image points in 2D homogeneous coordinates, one per column of a `3×N` matrix.
#[derive(Debug, Clone, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImagePoints(pub Matrix3xX<f64>);

impl ImagePoints {
    /// Creates image points with a unit homogeneous scale from pixel coordinates.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point2<f64>>,
    {
        let coordinates: Vec<f64> = points
            .into_iter()
            .flat_map(|p| [p.x, p.y, 1.0])
            .collect();
        Self(Matrix3xX::from_iterator(coordinates.len() / 3, coordinates))
    }

    pub fn len(&self) -> usize {
        self.0.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn homogeneous(&self, index: usize) -> Vector3<f64> {
        self.0.column(index).into_owned()
    }

    /// Divides the point by its homogeneous scale.
    ///
    /// Fails with [`DltError::DegenerateProjection`] if the point lies (numerically) at infinity.
    pub fn normalized(&self, index: usize) -> Result<Point2<f64>> {
        let h = self.homogeneous(index);
        if !(h.z.abs() >= HOMOGENEOUS_EPSILON) {
            return Err(DltError::DegenerateProjection { index, scale: h.z });
        }
        Ok(Point2::new(h.x / h.z, h.y / h.z))
    }

    /// All points divided by their homogeneous scale.
    pub fn normalized_points(&self) -> Result<Vec<Point2<f64>>> {
        (0..self.len()).map(|ix| self.normalized(ix)).collect()
    }
}
