use crate::{DltError, ImagePoints, ObjectPoints, Result, HOMOGENEOUS_EPSILON};
use nalgebra::{DMatrix, Matrix3x4, Matrix3xX, RowSVector};

/// A homography has eight degrees of freedom, so four correspondences are the minimum.
pub const MIN_POINTS: usize = 4;

/// Number of columns of the DLT coefficient matrix (entries of a 3×3 homography).
pub const COEFFICIENTS: usize = 9;

/// The two rows that object point `(x, y)` and its normalized image point `(u, v)` add to `A`.
#[rustfmt::skip]
pub fn coefficient_rows(x: f64, y: f64, u: f64, v: f64) -> [RowSVector<f64, COEFFICIENTS>; 2] {
    [
        RowSVector::<f64, COEFFICIENTS>::from_row_slice(&[
            0.0, 0.0, 0.0, -x,  -y,  -1.0, v * x,  v * y,  v,
        ]),
        RowSVector::<f64, COEFFICIENTS>::from_row_slice(&[
            x,   y,   1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u,
        ]),
    ]
}

/// Fails unless there are as many image points as object points and at least [`MIN_POINTS`].
pub(crate) fn check_correspondences(object: usize, image: usize) -> Result<()> {
    if object != image {
        return Err(DltError::PointCountMismatch { object, image });
    }
    if object < MIN_POINTS {
        return Err(DltError::NotEnoughPoints {
            minimum: MIN_POINTS,
            actual: object,
        });
    }
    Ok(())
}

/// Builds the `2N×9` DLT coefficient matrix `A` such that `A·h = 0` from explicitly given
/// image points.
///
/// Image points are divided by their homogeneous scale first, so any scaling of the image points
/// produces the same matrix. A non-finite object or image coordinate is reported as
/// [`DltError::NonFinitePoint`].
pub fn coefficient_matrix(object: &ObjectPoints, image: &ImagePoints) -> Result<DMatrix<f64>> {
    check_correspondences(object.len(), image.len())?;
    let mut a = DMatrix::zeros(2 * object.len(), COEFFICIENTS);
    for (ix, point) in object.points().enumerate() {
        let uv = image.normalized(ix)?;
        if !point.coords.iter().chain(uv.coords.iter()).all(|n| n.is_finite()) {
            return Err(DltError::NonFinitePoint { index: ix });
        }
        let [even, odd] = coefficient_rows(point.x, point.y, uv.x, uv.y);
        a.row_mut(2 * ix).copy_from(&even);
        a.row_mut(2 * ix + 1).copy_from(&odd);
    }
    Ok(a)
}

/// Builds the DLT coefficient matrix by projecting the object points through `p` to obtain
/// the image points.
pub fn coefficient_matrix_projected(
    object: &ObjectPoints,
    p: &Matrix3x4<f64>,
) -> Result<DMatrix<f64>> {
    if object.len() < MIN_POINTS {
        return Err(DltError::NotEnoughPoints {
            minimum: MIN_POINTS,
            actual: object.len(),
        });
    }
    coefficient_matrix(object, &project(object, p)?)
}

/// Projects the planar object points through the projective camera matrix `p`.
///
/// The returned image points are normalized to a unit homogeneous scale. A point that lands on
/// the plane at infinity of the camera is reported as [`DltError::DegenerateProjection`].
pub fn project(object: &ObjectPoints, p: &Matrix3x4<f64>) -> Result<ImagePoints> {
    let mut projected: Matrix3xX<f64> = p * object.to_homogeneous();
    for (index, mut column) in projected.column_iter_mut().enumerate() {
        let scale = column[2];
        if !(scale.abs() >= HOMOGENEOUS_EPSILON) {
            return Err(DltError::DegenerateProjection { index, scale });
        }
        column /= scale;
    }
    Ok(ImagePoints(projected))
}

/// Divides every row by the sum of the absolute values of its entries.
///
/// Rows whose L1 norm is zero are left untouched. Applying the normalization twice gives the same
/// matrix as applying it once.
pub fn normalize_rows(a: &DMatrix<f64>) -> DMatrix<f64> {
    let mut normalized = a.clone();
    for mut row in normalized.row_iter_mut() {
        let l1 = row.lp_norm(1);
        if l1 > 0.0 {
            row /= l1;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{reference_camera, square};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point2};

    #[test]
    fn rows_follow_the_dlt_layout() {
        let object = ObjectPoints::from_points((0..4).map(|i| Point2::new(i as f64, 2.0)));
        let image = ImagePoints(Matrix3xX::from_fn(4, |r, c| match r {
            0 => 10.0 * c as f64,
            1 => 3.0,
            _ => 2.0,
        }));
        let a = coefficient_matrix(&object, &image).unwrap();
        assert_eq!(a.shape(), (8, 9));
        // point 1: x = 1, y = 2, u = 5, v = 1.5
        assert_eq!(
            a.row(2).iter().copied().collect::<Vec<_>>(),
            vec![0.0, 0.0, 0.0, -1.0, -2.0, -1.0, 1.5, 3.0, 1.5]
        );
        assert_eq!(
            a.row(3).iter().copied().collect::<Vec<_>>(),
            vec![1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -5.0, -10.0, -5.0]
        );
    }

    #[test]
    fn explicit_and_projected_builders_agree() {
        let p = reference_camera();
        let object = square();
        let image = project(&object, &p).unwrap();
        // Rescale the homogeneous image points to make sure normalization happens.
        let scaled = ImagePoints(image.0.map(|n| 3.5 * n));
        let explicit = coefficient_matrix(&object, &scaled).unwrap();
        let projected = coefficient_matrix_projected(&object, &p).unwrap();
        assert_relative_eq!(explicit, projected, epsilon = 1e-9);
    }

    #[test]
    fn true_homography_is_in_the_null_space() {
        let p = reference_camera();
        let h = Matrix3::from_columns(&[p.column(0), p.column(1), p.column(3)]);
        let h = RowSVector::<f64, 9>::from_row_slice(h.transpose().as_slice());
        let a = coefficient_matrix_projected(&square(), &p).unwrap();
        let residual = &a * h.transpose();
        assert!(residual.norm() < 1e-6 * a.norm() * h.norm());
    }

    #[test]
    fn too_few_points_is_a_shape_error() {
        let object = ObjectPoints::from_points([Point2::new(0.0, 0.0); 3]);
        assert_eq!(
            coefficient_matrix_projected(&object, &reference_camera()),
            Err(DltError::NotEnoughPoints {
                minimum: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let image = ImagePoints::from_points([Point2::new(0.0, 0.0); 5]);
        assert_eq!(
            coefficient_matrix(&square(), &image),
            Err(DltError::PointCountMismatch {
                object: 4,
                image: 5
            })
        );
    }

    #[test]
    fn point_on_the_vanishing_line_is_degenerate() {
        // A camera whose third row vanishes for every point with x = 1.
        #[rustfmt::skip]
        let p = Matrix3x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            -1.0, 0.0, 0.0, 1.0,
        );
        assert!(matches!(
            coefficient_matrix_projected(&square(), &p),
            Err(DltError::DegenerateProjection { index: 0, .. })
        ));
    }

    #[test]
    fn non_finite_image_points_are_rejected() {
        let mut image = project(&square(), &reference_camera()).unwrap();
        image.0[(0, 2)] = f64::NAN;
        assert_eq!(
            coefficient_matrix(&square(), &image),
            Err(DltError::NonFinitePoint { index: 2 })
        );

        let mut p = reference_camera();
        p[(0, 0)] = f64::INFINITY;
        assert!(matches!(
            coefficient_matrix_projected(&square(), &p),
            Err(DltError::NonFinitePoint { .. })
        ));
    }

    #[test]
    fn row_normalization_is_idempotent() {
        let a = coefficient_matrix_projected(&square(), &reference_camera()).unwrap();
        let once = normalize_rows(&a);
        for row in once.row_iter() {
            assert_relative_eq!(row.lp_norm(1), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(normalize_rows(&once), once, epsilon = 1e-12);
    }

    #[test]
    fn zero_rows_survive_normalization() {
        let a = DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 0.0, 1.0, -1.0, 2.0]);
        let normalized = normalize_rows(&a);
        assert_eq!(normalized.row(0).iter().copied().collect::<Vec<_>>(), vec![0.0; 3]);
        assert_relative_eq!(normalized[(1, 2)], 0.5);
    }
}
