use crate::{BoundsSettings, OptimizeError, Result};
use average::{Estimate, Mean};
use dlt_core::{
    coefficient_matrix, condition_number, dlt_homography, mean_geometric_distance, Homography,
    ObjectPoints,
};
use dlt_pinhole::Camera;
use float_ord::FloatOrd;
use log::*;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Homography error of a configuration under image noise, with its perturbation bounds.
///
/// The error and the bounds are taken from the noisy trial whose coefficient matrix has the
/// largest Frobenius norm.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ErrorBounds {
    /// Condition number of the noise free coefficient matrix
    pub condition_number: f64,
    /// `‖H - H'‖ / ‖H‖`
    pub relative_error: f64,
    /// `‖A h - A' h'‖ / (‖H'‖ ‖A'‖)`
    pub lower: f64,
    /// `cond(A) ‖A - A'‖ / ‖A‖`
    pub upper: f64,
    pub mean_noisy_a_norm: f64,
    pub mean_noisy_h_norm: f64,
}

fn row_major(h: &Homography) -> DVector<f64> {
    DVector::from_iterator(9, h.0.transpose().iter().copied())
}

/// Runs `settings.trials` noisy DLT estimations of the homography from the plane points to their
/// undistorted projections.
pub fn error_bounds<R>(
    camera: &Camera,
    object: &ObjectPoints,
    settings: &BoundsSettings,
    rng: &mut R,
) -> Result<ErrorBounds>
where
    R: Rng + ?Sized,
{
    settings.validate()?;
    let image = camera.project(object, false)?;
    let a_true = coefficient_matrix(object, &image)?;
    let h_true = camera.homography();

    let mut a_norms = Mean::new();
    let mut h_norms = Mean::new();
    let mut worst: Option<(DMatrix<f64>, Homography)> = None;
    for _ in 0..settings.trials {
        let noisy = camera.add_noise(&image, settings.noise_mean, settings.noise_std_dev, rng)?;
        let a_noisy = coefficient_matrix(object, &noisy)?;
        let h_noisy = dlt_homography(object, &noisy)?;
        a_norms.add(a_noisy.norm());
        h_norms.add(h_noisy.0.norm());
        if worst
            .as_ref()
            .map_or(true, |(a, _)| FloatOrd(a_noisy.norm()) > FloatOrd(a.norm()))
        {
            worst = Some((a_noisy, h_noisy));
        }
    }
    let (a_noisy, h_noisy) = worst.ok_or(OptimizeError::InvalidSetting {
        name: "trials",
        reason: "must be at least 1".to_owned(),
    })?;

    let condition_number = condition_number(&a_true)?;
    let relative_error = (h_true.0 - h_noisy.0).norm() / h_true.0.norm();
    let upper = condition_number * (&a_true - &a_noisy).norm() / a_true.norm();
    let residual = &a_true * row_major(&h_true) - &a_noisy * row_major(&h_noisy);
    let lower = residual.norm() / (h_noisy.0.norm() * a_noisy.norm());

    debug!(
        "{} trials with noise N({}, {}): relative error {:e}, bounds [{:e}, {:e}]",
        settings.trials,
        settings.noise_mean,
        settings.noise_std_dev,
        relative_error,
        lower,
        upper
    );
    Ok(ErrorBounds {
        condition_number,
        relative_error,
        lower,
        upper,
        mean_noisy_a_norm: a_norms.mean(),
        mean_noisy_h_norm: h_norms.mean(),
    })
}

/// Mean reprojection error, in pixels, of homographies estimated from noisy projections of
/// `object` when they map the `validation` points.
///
/// Every trial adds noise to the undistorted projection of `object`, estimates a homography with
/// the DLT and measures [`mean_geometric_distance`] against the exact projection of `validation`.
pub fn validation_error<R>(
    camera: &Camera,
    object: &ObjectPoints,
    validation: &ObjectPoints,
    settings: &BoundsSettings,
    rng: &mut R,
) -> Result<f64>
where
    R: Rng + ?Sized,
{
    settings.validate()?;
    let image = camera.project(object, false)?;
    let validation_image = camera.project(validation, false)?;
    let mut errors = Mean::new();
    for _ in 0..settings.trials {
        let noisy = camera.add_noise(&image, settings.noise_mean, settings.noise_std_dev, rng)?;
        let h = dlt_homography(object, &noisy)?;
        errors.add(mean_geometric_distance(&h, validation, &validation_image)?);
    }
    debug!(
        "validation error over {} points: {:e} pixels",
        validation.len(),
        errors.mean()
    );
    Ok(errors.mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlt_core::nalgebra::Point2;
    use dlt_pinhole::Plane;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn square(half: f64) -> ObjectPoints {
        ObjectPoints::from_points([
            Point2::new(-half, -half),
            Point2::new(half, -half),
            Point2::new(half, half),
            Point2::new(-half, half),
        ])
    }

    #[test]
    fn noise_free_trials_recover_the_homography() {
        let settings = BoundsSettings {
            trials: 3,
            noise_std_dev: 0.0,
            ..BoundsSettings::default()
        };
        let bounds = error_bounds(
            &Camera::reference(),
            &square(0.1),
            &settings,
            &mut Pcg64::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(bounds.upper, 0.0);
        assert!(bounds.relative_error < 1e-6);
        assert!(bounds.lower < 1e-9);
        assert!(bounds.condition_number >= 1.0);
    }

    #[test]
    fn noisy_bounds_are_ordered() {
        let settings = BoundsSettings {
            trials: 50,
            ..BoundsSettings::default()
        };
        let bounds = error_bounds(
            &Camera::reference(),
            &square(0.1),
            &settings,
            &mut Pcg64::seed_from_u64(7),
        )
        .unwrap();
        assert!(bounds.relative_error > 0.0);
        assert!(bounds.lower <= bounds.upper);
        assert!(bounds.upper.is_finite());
        assert!(bounds.mean_noisy_a_norm > 0.0 && bounds.mean_noisy_h_norm > 0.0);
    }

    #[test]
    fn zero_trials_are_rejected() {
        let settings = BoundsSettings {
            trials: 0,
            ..BoundsSettings::default()
        };
        assert!(matches!(
            error_bounds(
                &Camera::reference(),
                &square(0.1),
                &settings,
                &mut Pcg64::seed_from_u64(0),
            ),
            Err(OptimizeError::InvalidSetting { name: "trials", .. })
        ));
    }

    #[test]
    fn noise_free_estimates_fit_the_validation_grid() {
        let settings = BoundsSettings {
            trials: 2,
            noise_std_dev: 0.0,
            ..BoundsSettings::default()
        };
        let error = validation_error(
            &Camera::reference(),
            &square(0.1),
            &Plane::default().uniform_grid(),
            &settings,
            &mut Pcg64::seed_from_u64(0),
        )
        .unwrap();
        assert!(error < 1e-6, "validation error {}", error);
    }

    #[test]
    fn spread_points_validate_better_than_compact_ones() {
        let settings = BoundsSettings {
            trials: 200,
            noise_std_dev: 1.0,
            ..BoundsSettings::default()
        };
        let camera = Camera::reference();
        let grid = Plane::default().uniform_grid();
        let wide = validation_error(
            &camera,
            &square(0.15),
            &grid,
            &settings,
            &mut Pcg64::seed_from_u64(5),
        )
        .unwrap();
        let compact = validation_error(
            &camera,
            &square(0.01),
            &grid,
            &settings,
            &mut Pcg64::seed_from_u64(5),
        )
        .unwrap();
        assert!(wide > 0.0 && wide.is_finite());
        assert!(wide < compact, "wide {} compact {}", wide, compact);
    }
}
