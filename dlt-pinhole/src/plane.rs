use crate::{CameraError, Result};
use dlt_core::nalgebra::{Point2, Vector2};
use dlt_core::ObjectPoints;
use log::debug;
use rand::Rng;
use std::f64::consts::TAU;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Rejection sampling gives up after this many candidates per requested point.
pub const ATTEMPTS_PER_POINT: usize = 1000;

/// The calibration plane `z = 0`, centered on the world origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Plane {
    /// Extent of the plane along `x` and `y`.
    pub size: Vector2<f64>,
    /// Number of grid points along `x` and `y`.
    pub grid: Vector2<usize>,
}

impl Plane {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(CameraError::InvalidPlane { width, height });
        }
        Ok(Self {
            size: Vector2::new(width, height),
            grid: Vector2::new(2, 2),
        })
    }

    pub fn grid(self, nx: usize, ny: usize) -> Self {
        Self {
            grid: Vector2::new(nx, ny),
            ..self
        }
    }

    /// Returns `true` if the point lies within the extent of the plane.
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let half = self.size / 2.0;
        point.x.abs() <= half.x && point.y.abs() <= half.y
    }

    /// An `nx × ny` grid spanning the whole plane, row by row.
    ///
    /// An axis with a single grid point places it on the center line.
    pub fn uniform_grid(&self) -> ObjectPoints {
        let axis = |count: usize, extent: f64| -> Vec<f64> {
            match count {
                0 => vec![],
                1 => vec![0.0],
                _ => (0..count)
                    .map(|i| -extent / 2.0 + extent * i as f64 / (count - 1) as f64)
                    .collect(),
            }
        };
        let xs = axis(self.grid.x, self.size.x);
        let ys = axis(self.grid.y, self.size.y);
        ObjectPoints::from_points(
            ys.iter()
                .flat_map(|&y| xs.iter().map(move |&x| Point2::new(x, y))),
        )
    }

    /// Draws `count` points uniformly from the disc of `radius` around the plane center, keeping
    /// every pair at least `min_separation` apart.
    ///
    /// Fails with [`CameraError::SamplingFailed`] if the points cannot be placed within
    /// `count * ATTEMPTS_PER_POINT` candidates.
    pub fn sample_points<R>(
        &self,
        count: usize,
        radius: f64,
        min_separation: f64,
        rng: &mut R,
    ) -> Result<ObjectPoints>
    where
        R: Rng + ?Sized,
    {
        let attempts = count * ATTEMPTS_PER_POINT;
        let mut points: Vec<Point2<f64>> = Vec::with_capacity(count);
        for _ in 0..attempts {
            if points.len() == count {
                break;
            }
            // The square root makes the density uniform over the area of the disc.
            let r = radius * rng.gen::<f64>().sqrt();
            let theta = TAU * rng.gen::<f64>();
            let candidate = Point2::new(r * theta.cos(), r * theta.sin());
            if points
                .iter()
                .all(|p| (p - candidate).norm() >= min_separation)
            {
                points.push(candidate);
            }
        }
        if points.len() < count {
            return Err(CameraError::SamplingFailed {
                count,
                radius,
                min_separation,
                attempts,
            });
        }
        debug!(
            "sampled {} points within radius {} at least {} apart",
            count, radius, min_separation
        );
        Ok(ObjectPoints::from_points(points))
    }
}

impl Default for Plane {
    /// A `0.3 × 0.3` plane with a `4 × 4` grid.
    fn default() -> Self {
        Self {
            size: Vector2::new(0.3, 0.3),
            grid: Vector2::new(4, 4),
        }
    }
}
