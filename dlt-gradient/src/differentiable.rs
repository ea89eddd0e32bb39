//! The matrix builder and the configuration metric as closed-form functions of the flat coordinate
//! vector.
//!
//! Nothing in here branches on the values of the coordinates, so derivatives carried by dual
//! numbers stay exact. Degenerate projections must be ruled out beforehand (the
//! [`GradientEngine`](crate::GradientEngine) builds the `f64` matrix with `dlt-core` first).

use dlt_core::COEFFICIENTS;
use nalgebra::{convert, DMatrix, Matrix3x4, RealField};

/// Projects the object point `(x, y, 0, 1)` through `p` and divides by the homogeneous scale.
pub fn project_point<T: RealField>(x: &T, y: &T, p: &Matrix3x4<f64>) -> (T, T) {
    let row = |r: usize| -> T {
        x.clone() * convert::<f64, T>(p[(r, 0)])
            + y.clone() * convert::<f64, T>(p[(r, 1)])
            + convert::<f64, T>(p[(r, 3)])
    };
    let w = row(2);
    (row(0) / w.clone(), row(1) / w)
}

/// The rows of the projected DLT coefficient matrix, two per point, in the layout of
/// [`dlt_core::coefficient_rows`].
pub fn projected_rows<T: RealField>(
    coordinates: &[T],
    p: &Matrix3x4<f64>,
) -> Vec<[T; COEFFICIENTS]> {
    debug_assert!(coordinates.len() % 2 == 0, "coordinates must come in pairs");
    coordinates
        .chunks_exact(2)
        .flat_map(|xy| {
            let x = xy[0].clone();
            let y = xy[1].clone();
            let (u, v) = project_point(&x, &y, p);
            let zero = T::zero();
            let one = T::one();
            [
                [
                    zero.clone(),
                    zero.clone(),
                    zero.clone(),
                    -x.clone(),
                    -y.clone(),
                    -one.clone(),
                    v.clone() * x.clone(),
                    v.clone() * y.clone(),
                    v,
                ],
                [
                    x.clone(),
                    y.clone(),
                    one,
                    zero.clone(),
                    zero.clone(),
                    zero,
                    -(u.clone() * x),
                    -(u.clone() * y),
                    -u,
                ],
            ]
        })
        .collect()
}

/// The configuration metric of the projected coefficient matrix.
///
/// Every row holds a `±1` entry, so its L1 norm is never zero.
pub fn configuration_metric<T: RealField>(coordinates: &[T], p: &Matrix3x4<f64>) -> T {
    let normalized: Vec<[T; COEFFICIENTS]> = projected_rows(coordinates, p)
        .into_iter()
        .map(|row| {
            let l1 = row
                .iter()
                .fold(T::zero(), |acc, a| acc + a.clone().abs());
            row.map(|a| a / l1.clone())
        })
        .collect();

    let mut metric = T::zero();
    for (i, a) in normalized.iter().enumerate() {
        for b in &normalized[i + 1..] {
            let dot = a
                .iter()
                .zip(b)
                .fold(T::zero(), |acc, (l, r)| acc + l.clone() * r.clone());
            metric += dot.clone() * dot;
        }
    }
    metric
}

/// `Σ W_ij A_ij(coordinates)` for a constant weight matrix `W` of the same shape as `A`.
///
/// With `W = ∂m/∂A` evaluated at the current coordinates, the gradient of the contraction is the
/// gradient of the metric `m` by the chain rule.
pub fn weighted_contraction<T: RealField>(
    coordinates: &[T],
    p: &Matrix3x4<f64>,
    weights: &DMatrix<f64>,
) -> T {
    debug_assert_eq!(weights.shape(), (coordinates.len(), COEFFICIENTS));
    projected_rows(coordinates, p)
        .into_iter()
        .enumerate()
        .fold(T::zero(), |acc, (r, row)| {
            row.into_iter()
                .enumerate()
                .fold(acc, |acc, (c, a)| acc + a * convert::<f64, T>(weights[(r, c)]))
        })
}
