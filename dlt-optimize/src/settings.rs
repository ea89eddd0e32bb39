use crate::{OptimizeError, Result};
use dlt_core::nalgebra::{Point2, Point3, Vector3};
use dlt_gradient::Metric;
use dlt_pinhole::{Camera, CameraIntrinsics, Plane};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

fn invalid(name: &'static str, reason: impl Into<String>) -> OptimizeError {
    OptimizeError::InvalidSetting {
        name,
        reason: reason.into(),
    }
}

/// The settings of the gradient descent.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OptimizerSettings {
    /// The metric whose gradient is descended
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_metric"))]
    pub metric: Metric,
    /// The step size of the first iteration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_initial_step"))]
    pub initial_step: f64,
    /// The amount the step size grows by after every iteration
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_step_increment"))]
    pub step_increment: f64,
    /// The number of iterations to run (there is no other stopping criterion)
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_iterations"))]
    pub iterations: usize,
    /// Point coordinates are clamped to `[-limit, limit]` after every step
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_limit"))]
    pub limit: f64,
    /// Divide the gradient by its largest absolute partial before stepping
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_normalize_gradient")
    )]
    pub normalize_gradient: bool,
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_step >= 0.0 && self.initial_step.is_finite()) {
            return Err(invalid("initial_step", "must be finite and not negative"));
        }
        if !(self.step_increment >= 0.0 && self.step_increment.is_finite()) {
            return Err(invalid("step_increment", "must be finite and not negative"));
        }
        if self.iterations == 0 {
            return Err(invalid("iterations", "must be at least 1"));
        }
        if !(self.limit > 0.0 && self.limit.is_finite()) {
            return Err(invalid("limit", "must be finite and positive"));
        }
        Ok(())
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            initial_step: default_initial_step(),
            step_increment: default_step_increment(),
            iterations: default_iterations(),
            limit: default_limit(),
            normalize_gradient: default_normalize_gradient(),
        }
    }
}

fn default_metric() -> Metric {
    Metric::ConditionNumber
}

fn default_initial_step() -> f64 {
    1e-10
}

fn default_step_increment() -> f64 {
    1e-10
}

fn default_iterations() -> usize {
    10_000
}

fn default_limit() -> f64 {
    0.15
}

fn default_normalize_gradient() -> bool {
    false
}

/// The simulated camera.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraSettings {
    /// The x focal length in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_focal"))]
    pub x_focal: f64,
    /// The y focal length in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_focal"))]
    pub y_focal: f64,
    /// The x optical center coordinate
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_x_center"))]
    pub x_center: f64,
    /// The y optical center coordinate
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_y_center"))]
    pub y_center: f64,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub skew: f64,
    /// The K1 radial distortion
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub radial_distortion: f64,
    /// Image width in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_width"))]
    pub width: usize,
    /// Image height in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_height"))]
    pub height: usize,
    /// Axis of the world to camera rotation, need not be normalized
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_rotation_axis"))]
    pub rotation_axis: [f64; 3],
    /// Angle of the world to camera rotation in degrees
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_rotation_degrees"))]
    pub rotation_degrees: f64,
    /// Position of the camera center in world coordinates
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_position"))]
    pub position: [f64; 3],
}

impl CameraSettings {
    pub fn camera(&self) -> Result<Camera> {
        let intrinsics = CameraIntrinsics::identity()
            .focals([self.x_focal, self.y_focal].into())
            .principal_point(Point2::new(self.x_center, self.y_center))
            .skew(self.skew);
        Ok(Camera::new(intrinsics)
            .k1(self.radial_distortion)
            .image_size(self.width, self.height)
            .axis_angle(
                Vector3::from(self.rotation_axis),
                self.rotation_degrees.to_radians(),
            )?
            .center(Point3::from(self.position)))
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            x_focal: default_focal(),
            y_focal: default_focal(),
            x_center: default_x_center(),
            y_center: default_y_center(),
            skew: 0.0,
            radial_distortion: 0.0,
            width: default_width(),
            height: default_height(),
            rotation_axis: default_rotation_axis(),
            rotation_degrees: default_rotation_degrees(),
            position: default_position(),
        }
    }
}

fn default_focal() -> f64 {
    800.0
}

fn default_x_center() -> f64 {
    640.0
}

fn default_y_center() -> f64 {
    480.0
}

fn default_width() -> usize {
    1280
}

fn default_height() -> usize {
    960
}

fn default_rotation_axis() -> [f64; 3] {
    [1.0, 1.0, 0.0]
}

fn default_rotation_degrees() -> f64 {
    165.0
}

fn default_position() -> [f64; 3] {
    [0.0, -0.2, 1.0]
}

/// The calibration plane and the initial point configuration drawn on it.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlaneSettings {
    /// Extent of the plane along x
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_plane_size"))]
    pub width: f64,
    /// Extent of the plane along y
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_plane_size"))]
    pub height: f64,
    /// Number of points optimized (4 or 5)
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_points"))]
    pub points: usize,
    /// Initial points are drawn from a disc of this radius around the plane center
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_radius"))]
    pub radius: f64,
    /// Minimum distance between any two initial points
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_min_separation"))]
    pub min_separation: f64,
    /// Seed of the random number generator
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub seed: u64,
}

impl PlaneSettings {
    pub fn plane(&self) -> Result<Plane> {
        Ok(Plane::new(self.width, self.height)?)
    }
}

impl Default for PlaneSettings {
    fn default() -> Self {
        Self {
            width: default_plane_size(),
            height: default_plane_size(),
            points: default_points(),
            radius: default_radius(),
            min_separation: default_min_separation(),
            seed: 0,
        }
    }
}

fn default_plane_size() -> f64 {
    0.3
}

fn default_points() -> usize {
    4
}

fn default_radius() -> f64 {
    0.15
}

fn default_min_separation() -> f64 {
    0.02
}

/// The Monte-Carlo estimation of the homography error bounds and of the validation error.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundsSettings {
    /// Whether the sandbox runs the estimation before and after optimizing
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub enabled: bool,
    /// The number of noisy trials
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_trials"))]
    pub trials: usize,
    /// Mean of the image noise in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub noise_mean: f64,
    /// Standard deviation of the image noise in pixels
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_noise_std_dev"))]
    pub noise_std_dev: f64,
}

impl BoundsSettings {
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(invalid("trials", "must be at least 1"));
        }
        if !(self.noise_std_dev >= 0.0 && self.noise_std_dev.is_finite()) {
            return Err(invalid("noise_std_dev", "must be finite and not negative"));
        }
        if !self.noise_mean.is_finite() {
            return Err(invalid("noise_mean", "must be finite"));
        }
        Ok(())
    }
}

impl Default for BoundsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trials: default_trials(),
            noise_mean: 0.0,
            noise_std_dev: default_noise_std_dev(),
        }
    }
}

fn default_trials() -> usize {
    1000
}

fn default_noise_std_dev() -> f64 {
    4.0
}

/// Everything needed to run one experiment.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ExperimentSettings {
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub camera: CameraSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub plane: PlaneSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub optimizer: OptimizerSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub bounds: BoundsSettings,
}

impl ExperimentSettings {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        self.bounds.validate()?;
        if !(4..=5).contains(&self.plane.points) {
            return Err(invalid("points", "only 4 or 5 points can be optimized"));
        }
        if !(self.plane.radius > 0.0) {
            return Err(invalid("radius", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_describe_the_reference_experiment() {
        let settings = ExperimentSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.optimizer.metric, Metric::ConditionNumber);
        assert_eq!(settings.optimizer.iterations, 10_000);
        assert_eq!(settings.optimizer.initial_step, 1e-10);
        assert_eq!(settings.optimizer.step_increment, 1e-10);
        assert_eq!(settings.optimizer.limit, 0.15);
        assert!(!settings.optimizer.normalize_gradient);

        let camera = settings.camera.camera().unwrap();
        assert_relative_eq!(
            camera.projection_matrix(),
            Camera::reference().projection_matrix(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn invalid_settings_are_named() {
        let mut settings = ExperimentSettings::default();
        settings.optimizer.iterations = 0;
        assert!(matches!(
            settings.validate(),
            Err(OptimizeError::InvalidSetting { name: "iterations", .. })
        ));

        let mut settings = ExperimentSettings::default();
        settings.optimizer.limit = -0.1;
        assert!(matches!(
            settings.validate(),
            Err(OptimizeError::InvalidSetting { name: "limit", .. })
        ));

        let mut settings = ExperimentSettings::default();
        settings.plane.points = 6;
        assert!(matches!(
            settings.validate(),
            Err(OptimizeError::InvalidSetting { name: "points", .. })
        ));

        let mut settings = ExperimentSettings::default();
        settings.bounds.trials = 0;
        assert!(matches!(
            settings.validate(),
            Err(OptimizeError::InvalidSetting { name: "trials", .. })
        ));
    }

    #[cfg(feature = "serde-serialize")]
    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let json = r#"{"optimizer": {"metric": "configuration-metric", "iterations": 5}}"#;
        let settings: ExperimentSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.optimizer.metric, Metric::ConfigurationMetric);
        assert_eq!(settings.optimizer.iterations, 5);
        assert_eq!(settings.optimizer.limit, 0.15);
        assert_eq!(settings.camera, CameraSettings::default());
        assert!(!settings.bounds.enabled);
    }

    #[cfg(feature = "serde-serialize")]
    #[test]
    fn bounds_can_be_enabled_from_the_file() {
        let json = r#"{"bounds": {"enabled": true, "trials": 20}}"#;
        let settings: ExperimentSettings = serde_json::from_str(json).unwrap();
        assert!(settings.bounds.enabled);
        assert_eq!(settings.bounds.trials, 20);
        assert_eq!(settings.bounds.noise_std_dev, 4.0);
    }
}
