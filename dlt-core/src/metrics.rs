use crate::{normalize_rows, DltError, Result, COEFFICIENTS, MIN_POINTS};
use float_ord::FloatOrd;
use nalgebra::{DMatrix, DVector};

/// The DLT matrix of exact correspondences has the homography in its null space, so its rank is
/// at most eight.
pub const DLT_RANK: usize = 8;

/// Iteration cap of the singular value decomposition.
pub const SVD_ITERATIONS: usize = 1000;

/// Fails with [`DltError::MatrixShape`] unless `a` looks like a `2N×9` coefficient matrix with
/// `N >= 4`, and with [`DltError::NonFiniteMatrix`] if any entry is NaN or infinite.
pub fn check_shape(a: &DMatrix<f64>) -> Result<()> {
    let (rows, cols) = a.shape();
    if cols != COEFFICIENTS || rows < 2 * MIN_POINTS || rows % 2 != 0 {
        return Err(DltError::MatrixShape { rows, cols });
    }
    if let Some(ix) = a.iter().position(|n| !n.is_finite()) {
        // Storage is column major.
        return Err(DltError::NonFiniteMatrix {
            row: ix % rows,
            col: ix / rows,
        });
    }
    Ok(())
}

/// The extreme singular triplets that define the conditioning number of a coefficient matrix.
///
/// Only the first [`DLT_RANK`] singular values take part. For four points (`8×9`) that is the
/// whole spectrum. With more points the last singular value belongs to the homography itself
/// and is (close to) zero for exact correspondences, so it is left out.
#[derive(Debug, Clone)]
pub struct ConditionDecomposition {
    pub sigma_max: f64,
    pub sigma_min: f64,
    pub u_max: DVector<f64>,
    pub v_max: DVector<f64>,
    pub u_min: DVector<f64>,
    pub v_min: DVector<f64>,
}

impl ConditionDecomposition {
    pub fn new(a: &DMatrix<f64>) -> Result<Self> {
        check_shape(a)?;
        let svd = a
            .clone()
            .try_svd(true, true, f64::EPSILON, SVD_ITERATIONS)
            .ok_or(DltError::SvdFailed)?;
        let u = svd.u.as_ref().ok_or(DltError::SvdFailed)?;
        let v_t = svd.v_t.as_ref().ok_or(DltError::SvdFailed)?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_unstable_by_key(|&ix| FloatOrd(-svd.singular_values[ix]));
        let max = order[0];
        let min = order[DLT_RANK - 1];

        Ok(Self {
            sigma_max: svd.singular_values[max],
            sigma_min: svd.singular_values[min],
            u_max: u.column(max).into_owned(),
            v_max: v_t.row(max).transpose(),
            u_min: u.column(min).into_owned(),
            v_min: v_t.row(min).transpose(),
        })
    }

    /// `σ_max / σ_min`, or `+∞` when the configuration is rank deficient.
    pub fn value(&self) -> f64 {
        if self.sigma_min > 0.0 {
            self.sigma_max / self.sigma_min
        } else {
            f64::INFINITY
        }
    }

    /// The derivative of the conditioning number with respect to every entry of `A`.
    ///
    /// Since `∂σ_k/∂A = u_k v_kᵀ` for a simple singular value,
    /// `∂κ/∂A = (u_max v_maxᵀ - κ u_min v_minᵀ) / σ_min`.
    pub fn sensitivity(&self) -> DMatrix<f64> {
        let kappa = self.value();
        (&self.u_max * self.v_max.transpose() - kappa * &self.u_min * self.v_min.transpose())
            / self.sigma_min
    }
}

/// Singular values of `a`, sorted from largest to smallest.
pub fn singular_values(a: &DMatrix<f64>) -> Result<DVector<f64>> {
    check_shape(a)?;
    let mut values: Vec<f64> = a
        .clone()
        .try_svd(false, false, f64::EPSILON, SVD_ITERATIONS)
        .ok_or(DltError::SvdFailed)?
        .singular_values
        .iter()
        .copied()
        .collect();
    values.sort_unstable_by_key(|&n| FloatOrd(-n));
    Ok(DVector::from_vec(values))
}

/// The conditioning number `σ_1 / σ_8` of the coefficient matrix. Smaller is better.
///
/// For four points this is the plain `σ_max / σ_min` of the `8×9` matrix. For five or more
/// points it is not: the smallest singular value, which belongs to the homography, is skipped
/// and the eighth largest is used instead (see [`ConditionDecomposition`]). The result is at
/// least `1`, and `+∞` for rank-deficient (duplicate or collinear) configurations.
pub fn condition_number(a: &DMatrix<f64>) -> Result<f64> {
    Ok(ConditionDecomposition::new(a)?.value())
}

/// Measures how redundant the rows of the coefficient matrix are. Smaller is better.
///
/// Every row is divided by its L1 norm, the Gram matrix `G = A·Aᵀ` of the normalized rows is
/// formed and the squares of its strictly upper triangular entries are summed.
pub fn configuration_metric(a: &DMatrix<f64>) -> Result<f64> {
    check_shape(a)?;
    let normalized = normalize_rows(a);
    let gram = &normalized * normalized.transpose();
    let n = gram.nrows();
    Ok((0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|ix| gram[ix].powi(2))
        .sum())
}
