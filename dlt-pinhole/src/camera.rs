use crate::{CameraError, Result};
use dlt_core::nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Rotation3, Unit, Vector2, Vector3};
use dlt_core::{project, DltError, Homography, ImagePoints, ObjectPoints, HOMOGENEOUS_EPSILON};
use rand::Rng;
use rand_distr::{Distribution, Normal};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This contains intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    pub fn identity() -> Self {
        Self {
            focals: Vector2::new(1.0, 1.0),
            skew: 0.0,
            principal_point: Point2::new(0.0, 0.0),
        }
    }

    pub fn focals(self, focals: Vector2<f64>) -> Self {
        Self { focals, ..self }
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    pub fn skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  self.skew,      self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Converts pixel coordinates into normalized image coordinates.
    pub fn calibrate(&self, pixel: Point2<f64>) -> Point2<f64> {
        let centered = pixel - self.principal_point;
        let y = centered.y / self.focals.y;
        let x = (centered.x - self.skew * y) / self.focals.x;
        Point2::new(x, y)
    }

    /// Converts normalized image coordinates back into pixel coordinates.
    pub fn uncalibrate(&self, normalized: Point2<f64>) -> Point2<f64> {
        let y = normalized.y * self.focals.y;
        let x = normalized.x * self.focals.x + self.skew * normalized.y;
        Point2::new(x, y) + self.principal_point.coords
    }
}

/// Camera intrinsics with one radial distortion coefficient (K1).
///
/// A distorted normalized point `d` and its undistorted counterpart `u` are related by
/// `u = d / (1 + k1·|d|²)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsicsK1Distortion {
    pub simple_intrinsics: CameraIntrinsics,
    pub k1: f64,
}

impl CameraIntrinsicsK1Distortion {
    pub fn new(simple_intrinsics: CameraIntrinsics, k1: f64) -> Self {
        Self {
            simple_intrinsics,
            k1,
        }
    }

    /// Takes a pixel and removes the distortion, returning undistorted normalized coordinates.
    pub fn calibrate(&self, pixel: Point2<f64>) -> Point2<f64> {
        let distorted = self.simple_intrinsics.calibrate(pixel);
        let r2 = distorted.coords.norm_squared();
        (distorted.coords / (1.0 + self.k1 * r2)).into()
    }

    /// Distorts undistorted normalized coordinates and converts them into a pixel.
    ///
    /// Returns `None` if no distorted point maps onto `undistorted`, which happens far from the
    /// optical axis when `k1` is positive.
    pub fn uncalibrate(&self, undistorted: Point2<f64>) -> Option<Point2<f64>> {
        // Solving `r_d = r_u·(1 + k1·r_d²)` gives a quadratic in `k1·r_d²`.
        let u2 = undistorted.coords.norm_squared();
        let k1_u2 = self.k1 * u2;
        let r2_mul_k1 = if k1_u2 == 0.0 {
            0.0
        } else {
            let discriminant = 1.0 - 4.0 * k1_u2;
            if discriminant < 0.0 {
                return None;
            }
            -(2.0 * k1_u2 + discriminant.sqrt() - 1.0) / (2.0 * k1_u2)
        };
        Some(
            self.simple_intrinsics
                .uncalibrate((undistorted.coords * (1.0 + r2_mul_k1)).into()),
        )
    }
}

/// A simulated pinhole camera observing the calibration plane `z = 0`.
///
/// The pose is given by the world to camera rotation `R` and the camera center `c` in world
/// coordinates, so that `t = -R·c` and `P = K [R | t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Camera {
    pub intrinsics: CameraIntrinsicsK1Distortion,
    pub image_size: Vector2<usize>,
    pub rotation: Rotation3<f64>,
    pub center: Point3<f64>,
}

impl Camera {
    /// Creates an undistorted camera at the world origin whose image is centered on the principal
    /// point.
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        let image_size =
            (2.0 * intrinsics.principal_point.coords).map(|n| n.round().max(0.0) as usize);
        Self {
            intrinsics: CameraIntrinsicsK1Distortion::new(intrinsics, 0.0),
            image_size,
            rotation: Rotation3::identity(),
            center: Point3::origin(),
        }
    }

    /// The experiment camera: `fx = fy = 800`, a `1280×960` image, rotated by 165° about
    /// `(1, 1, 0)` and centered at `(0, -0.2, 1)`.
    pub fn reference() -> Self {
        Self::new(
            CameraIntrinsics::identity()
                .focal(800.0)
                .principal_point(Point2::new(640.0, 480.0)),
        )
        .rotation(Rotation3::from_axis_angle(
            &Unit::new_normalize(Vector3::new(1.0, 1.0, 0.0)),
            165f64.to_radians(),
        ))
        .center(Point3::new(0.0, -0.2, 1.0))
    }

    pub fn k1(self, k1: f64) -> Self {
        Self {
            intrinsics: CameraIntrinsicsK1Distortion { k1, ..self.intrinsics },
            ..self
        }
    }

    pub fn image_size(self, width: usize, height: usize) -> Self {
        Self {
            image_size: Vector2::new(width, height),
            ..self
        }
    }

    pub fn rotation(self, rotation: Rotation3<f64>) -> Self {
        Self { rotation, ..self }
    }

    /// Sets the rotation from an axis, which need not be normalized, and an angle in radians.
    pub fn axis_angle(self, axis: Vector3<f64>, angle: f64) -> Result<Self> {
        let axis = Unit::try_new(axis, f64::EPSILON).ok_or(CameraError::ZeroRotationAxis)?;
        Ok(self.rotation(Rotation3::from_axis_angle(&axis, angle)))
    }

    pub fn center(self, center: Point3<f64>) -> Self {
        Self { center, ..self }
    }

    pub fn translation(&self) -> Vector3<f64> {
        -(self.rotation * self.center.coords)
    }

    /// `[R | t]`
    pub fn extrinsic_matrix(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_columns_mut::<3>(0).copy_from(self.rotation.matrix());
        rt.set_column(3, &self.translation());
        rt
    }

    /// `P = K [R | t]`, which ignores distortion.
    pub fn projection_matrix(&self) -> Matrix3x4<f64> {
        self.intrinsics.simple_intrinsics.matrix() * self.extrinsic_matrix()
    }

    /// Projects the object points into the image, returning pixels with a unit homogeneous scale.
    ///
    /// With `distorted` set, the K1 distortion of the camera is applied between the pinhole
    /// projection and the intrinsic matrix.
    pub fn project(&self, object: &ObjectPoints, distorted: bool) -> Result<ImagePoints> {
        if !distorted {
            return Ok(project(object, &self.projection_matrix())?);
        }
        let camera_points = self.extrinsic_matrix() * object.to_homogeneous();
        let pixels = camera_points
            .column_iter()
            .enumerate()
            .map(|(index, p)| {
                if !(p[2].abs() >= HOMOGENEOUS_EPSILON) {
                    return Err(DltError::DegenerateProjection { index, scale: p[2] }.into());
                }
                self.intrinsics
                    .uncalibrate(Point2::new(p[0] / p[2], p[1] / p[2]))
                    .ok_or(CameraError::DistortionOutOfRange {
                        index,
                        k1: self.intrinsics.k1,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ImagePoints::from_points(pixels))
    }

    /// Adds independent Gaussian noise to both pixel coordinates of every image point.
    pub fn add_noise<R>(
        &self,
        image: &ImagePoints,
        mean: f64,
        std_dev: f64,
        rng: &mut R,
    ) -> Result<ImagePoints>
    where
        R: Rng + ?Sized,
    {
        if !(std_dev >= 0.0 && std_dev.is_finite()) {
            return Err(CameraError::InvalidNoise(std_dev));
        }
        let normal = Normal::new(mean, std_dev).map_err(|_| CameraError::InvalidNoise(std_dev))?;
        let noisy = image
            .normalized_points()?
            .into_iter()
            .map(|p| Point2::new(p.x + normal.sample(rng), p.y + normal.sample(rng)))
            .collect::<Vec<_>>();
        Ok(ImagePoints::from_points(noisy))
    }

    /// The ground truth homography `K [r1 r2 t]` from the plane `z = 0` to the image, scaled so
    /// that `H[2,2] = 1`.
    pub fn homography(&self) -> Homography {
        let rt = self.extrinsic_matrix();
        let plane = Matrix3::from_columns(&[rt.column(0), rt.column(1), rt.column(3)]);
        Homography(self.intrinsics.simple_intrinsics.matrix() * plane).normalized()
    }

    /// Returns `true` if every image point lands on the sensor.
    pub fn in_view(&self, image: &ImagePoints) -> Result<bool> {
        let size = self.image_size.map(|n| n as f64);
        Ok(image
            .normalized_points()?
            .iter()
            .all(|p| (0.0..size.x).contains(&p.x) && (0.0..size.y).contains(&p.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dlt_core::dlt_homography;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn square(half: f64) -> ObjectPoints {
        ObjectPoints::from_points([
            Point2::new(half, half),
            Point2::new(-half, half),
            Point2::new(half, -half),
            Point2::new(-half, -half),
        ])
    }

    #[test]
    fn reference_camera_looks_at_the_plane() {
        let camera = Camera::reference();
        assert_eq!(camera.image_size, Vector2::new(1280, 960));
        let image = camera.project(&square(0.15), false).unwrap();
        assert!(camera.in_view(&image).unwrap());
        // The plane origin lies in front of the camera.
        let origin = camera.extrinsic_matrix() * Point3::<f64>::origin().to_homogeneous();
        assert!(origin.z > 0.0);
    }

    #[test]
    fn calibration_round_trip() {
        let intrinsics = CameraIntrinsicsK1Distortion::new(
            CameraIntrinsics {
                focals: Vector2::new(800.0, 900.0),
                principal_point: Point2::new(500.0, 600.0),
                skew: 1.7,
            },
            -0.164624,
        );
        let pixel = Point2::new(471.0, 322.0);
        let normalized = intrinsics.calibrate(pixel);
        let back = intrinsics.uncalibrate(normalized).unwrap();
        assert!((pixel - back).norm() < 1e-6);
    }

    #[test]
    fn zero_k1_matches_the_projection_matrix() {
        let camera = Camera::reference();
        let object = square(0.1);
        let undistorted = camera.project(&object, false).unwrap();
        let distorted = camera.project(&object, true).unwrap();
        assert_relative_eq!(undistorted.0, distorted.0, epsilon = 1e-9);
    }

    #[test]
    fn positive_k1_pushes_points_outwards() {
        let camera = Camera::reference();
        let object = square(0.1);
        let plain = camera.project(&object, true).unwrap();
        let barrel = camera.k1(0.05).project(&object, true).unwrap();
        let pp = camera.intrinsics.simple_intrinsics.principal_point;
        for (a, b) in plain
            .normalized_points()
            .unwrap()
            .iter()
            .zip(barrel.normalized_points().unwrap())
        {
            assert!((b - pp).norm() > (a - pp).norm());
        }
    }

    #[test]
    fn strong_distortion_is_out_of_range() {
        let camera = Camera::reference().k1(10.0);
        assert!(matches!(
            camera.project(&square(0.15), true),
            Err(CameraError::DistortionOutOfRange { k1, .. }) if k1 == 10.0
        ));
    }

    #[test]
    fn homography_matches_dlt_estimate() {
        let camera = Camera::reference();
        let object = square(0.12);
        let image = camera.project(&object, false).unwrap();
        let estimated = dlt_homography(&object, &image).unwrap();
        assert_relative_eq!(
            camera.homography().0,
            estimated.0,
            max_relative = 1e-6,
            epsilon = 1e-9
        );
    }

    #[test]
    fn noise_is_applied_in_pixels() {
        let camera = Camera::reference();
        let image = camera.project(&square(0.1), false).unwrap();
        let mut rng = Pcg64::seed_from_u64(0);
        let shifted = camera.add_noise(&image, 2.0, 0.0, &mut rng).unwrap();
        for (a, b) in image
            .normalized_points()
            .unwrap()
            .iter()
            .zip(shifted.normalized_points().unwrap())
        {
            assert_relative_eq!(b.coords, a.coords.add_scalar(2.0), epsilon = 1e-9);
        }

        let noisy = camera.add_noise(&image, 0.0, 4.0, &mut rng).unwrap();
        assert_ne!(noisy, image);
        assert_eq!(
            camera.add_noise(&image, 0.0, -1.0, &mut rng),
            Err(CameraError::InvalidNoise(-1.0))
        );
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert_eq!(
            Camera::reference().axis_angle(Vector3::zeros(), 1.0),
            Err(CameraError::ZeroRotationAxis)
        );
    }
}
