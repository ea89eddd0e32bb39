use crate::{
    check_correspondences, coefficient_matrix, DltError, ImagePoints, ObjectPoints, Result,
    HOMOGENEOUS_EPSILON,
};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use float_ord::FloatOrd;
use nalgebra::{Matrix3, Matrix3xX, Point2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

const EIGEN_EPSILON: f64 = 1e-12;
const EIGEN_ITERATIONS: usize = 1000;

/// A planar homography mapping object points `(x, y, 1)` to homogeneous image points.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    /// Builds the homography from the row-major nine-vector `h` that solves `A·h = 0`.
    pub fn from_row_major(h: &[f64]) -> Self {
        Self(Matrix3::from_row_slice(h))
    }

    /// Scales the homography so that `H[2,2] = 1`.
    ///
    /// A homography whose bottom right entry is (numerically) zero is returned as is.
    pub fn normalized(&self) -> Self {
        let scale = self.0[(2, 2)];
        if scale.abs() > f64::EPSILON {
            Self(self.0 / scale)
        } else {
            *self
        }
    }

    pub fn inverse(&self) -> Result<Self> {
        self.0
            .try_inverse()
            .map(Self)
            .ok_or(DltError::SingularHomography)
    }

    /// Maps the object points into the image, without dividing by the homogeneous scale.
    pub fn transfer(&self, object: &ObjectPoints) -> ImagePoints {
        ImagePoints(self.0 * object.to_planar_homogeneous())
    }

    /// Maps image points back onto the object plane.
    pub fn transfer_back(&self, image: &ImagePoints) -> Result<ImagePoints> {
        Ok(ImagePoints(self.inverse()?.0 * &image.0))
    }
}

/// Estimates the homography with the normalized DLT and scales it so that `H[2,2] = 1`.
///
/// Both point sets are first moved to their centroid and scaled to a mean distance of `√2`.
/// The solution `h` is the eigenvector of `AᵀA` with the smallest eigenvalue.
pub fn dlt_homography(object: &ObjectPoints, image: &ImagePoints) -> Result<Homography> {
    check_correspondences(object.len(), image.len())?;
    let object_points: Vec<Point2<f64>> = object.points().collect();
    let image_points = image.normalized_points()?;
    let t_object = similarity(&object_points)?;
    let t_image = similarity(&image_points)?;

    let a = coefficient_matrix(
        &ObjectPoints::from_points(object_points.iter().map(|p| t_object.transform_point(p))),
        &ImagePoints::from_points(image_points.iter().map(|p| t_image.transform_point(p))),
    )?;
    let ata = a.transpose() * a;
    let eigens = ata
        .try_symmetric_eigen(EIGEN_EPSILON, EIGEN_ITERATIONS)
        .ok_or(DltError::EigenFailed)?;
    let h = eigens
        .eigenvalues
        .iter()
        .enumerate()
        .min_by_key(|&(_, &n)| FloatOrd(n))
        .map(|(ix, _)| eigens.eigenvectors.column(ix).into_owned())
        .ok_or(DltError::EigenFailed)?;

    let normalized = Homography::from_row_major(h.as_slice());
    let t_image_inverse = t_image
        .try_inverse()
        .ok_or(DltError::CoincidentPoints)?;
    Ok(Homography(t_image_inverse * normalized.0 * t_object).normalized())
}

/// Translates the centroid to the origin and scales to a mean distance of `√2`.
fn similarity(points: &[Point2<f64>]) -> Result<Matrix3<f64>> {
    let n = points.len() as f64;
    let centroid = points.iter().fold(Point2::origin(), |c, p| c + p.coords / n);
    let mean_distance = points
        .iter()
        .map(|p| (p - centroid).norm())
        .sum::<f64>()
        / n;
    if mean_distance <= f64::EPSILON {
        return Err(DltError::CoincidentPoints);
    }
    let scale = 2f64.sqrt() / mean_distance;
    #[rustfmt::skip]
    let t = Matrix3::new(
        scale, 0.0,   -scale * centroid.x,
        0.0,   scale, -scale * centroid.y,
        0.0,   0.0,   1.0,
    );
    Ok(t)
}

fn dehomogenize(points: &Matrix3xX<f64>) -> Result<Vec<Point2<f64>>> {
    points
        .column_iter()
        .enumerate()
        .map(|(index, p)| {
            if !(p[2].abs() >= HOMOGENEOUS_EPSILON) {
                return Err(DltError::DegenerateProjection {
                    index,
                    scale: p[2],
                });
            }
            Ok(Point2::new(p[0] / p[2], p[1] / p[2]))
        })
        .collect()
}

/// The algebraic error of every correspondence, as defined in Multiple View Geometry.
///
/// Neither the measured nor the transferred point is normalized, so the distance is only
/// meaningful relative to the scale of `h`.
pub fn algebraic_distance(
    h: &Homography,
    object: &ObjectPoints,
    image: &ImagePoints,
) -> Result<Vec<f64>> {
    if object.len() != image.len() {
        return Err(DltError::PointCountMismatch {
            object: object.len(),
            image: image.len(),
        });
    }
    let transferred = h.transfer(object);
    Ok(transferred
        .column_iter()
        .zip(image.column_iter())
        .map(|(t, m)| (t[0] * m[2] - m[0] * t[2]).powi(2) + (m[1] * t[2] - m[2] * t[1]).powi(2))
        .collect())
}

/// The image distance between every measured point and its object point transferred by `h`.
pub fn geometric_distance(
    h: &Homography,
    object: &ObjectPoints,
    image: &ImagePoints,
) -> Result<Vec<f64>> {
    if object.len() != image.len() {
        return Err(DltError::PointCountMismatch {
            object: object.len(),
            image: image.len(),
        });
    }
    let measured = image.normalized_points()?;
    let transferred = dehomogenize(&h.transfer(object))?;
    Ok(measured
        .iter()
        .zip(&transferred)
        .map(|(m, t)| (m - t).norm())
        .collect())
}

/// Mean of [`geometric_distance`] over all points, the usual validation error of an estimate.
pub fn mean_geometric_distance(
    h: &Homography,
    object: &ObjectPoints,
    image: &ImagePoints,
) -> Result<f64> {
    let distances = geometric_distance(h, object, image)?;
    if distances.is_empty() {
        return Ok(0.0);
    }
    Ok(distances.iter().sum::<f64>() / distances.len() as f64)
}

/// `d(x', H·x)` over the whole point set: the root of the summed squared image distances.
pub fn transfer_error(h: &Homography, object: &ObjectPoints, image: &ImagePoints) -> Result<f64> {
    Ok(geometric_distance(h, object, image)?
        .iter()
        .map(|d| d * d)
        .sum::<f64>()
        .sqrt())
}

/// `d(x', H·x) + d(x, H⁻¹·x')`, measuring the error in both the image and the object plane.
pub fn symmetric_transfer_error(
    h: &Homography,
    object: &ObjectPoints,
    image: &ImagePoints,
) -> Result<f64> {
    let forward = transfer_error(h, object, image)?;
    let back = dehomogenize(&h.transfer_back(image)?.0)?;
    let backward = back
        .iter()
        .zip(object.points())
        .map(|(b, o)| (b - o).norm_squared())
        .sum::<f64>()
        .sqrt();
    Ok(forward + backward)
}

/// Frobenius norm of the difference of two homographies.
///
/// Both should be normalized the same way (see [`Homography::normalized`]) for this to be
/// meaningful.
pub fn homography_matrix_error(expected: &Homography, estimated: &Homography) -> f64 {
    (expected.0 - estimated.0).norm()
}
