use crate::differentiable::{configuration_metric, weighted_contraction};
use crate::{GradientError, Result};
use dlt_core::{
    coefficient_matrix_projected, condition_number, ConditionDecomposition, DltError, ObjectPoints,
};
use log::trace;
use nalgebra::{DMatrix, Matrix3x4, SVector, Vector2};
use num_dual::{gradient, DualSVec64};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The quality metric of the coefficient matrix being differentiated. Both are minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(Serialize, Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Metric {
    ConditionNumber,
    ConfigurationMetric,
}

impl Metric {
    /// Evaluates the metric on an explicit coefficient matrix.
    pub fn evaluate(self, a: &DMatrix<f64>) -> dlt_core::Result<f64> {
        match self {
            Metric::ConditionNumber => condition_number(a),
            Metric::ConfigurationMetric => dlt_core::configuration_metric(a),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::ConditionNumber => "condition-number",
            Metric::ConfigurationMetric => "configuration-metric",
        })
    }
}

impl FromStr for Metric {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "condition-number" | "cond" => Ok(Metric::ConditionNumber),
            "configuration-metric" | "configuration" | "volker" => Ok(Metric::ConfigurationMetric),
            _ => Err(GradientError::UnknownMetric(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Axis {
    X,
    Y,
}

/// `∂metric/∂x_point` or `∂metric/∂y_point`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialDerivative {
    pub metric: Metric,
    pub points: usize,
    pub point: usize,
    pub axis: Axis,
}

impl PartialDerivative {
    /// Position of the differentiated coordinate in the flat coordinate vector.
    pub fn coordinate(&self) -> usize {
        2 * self.point
            + match self.axis {
                Axis::X => 0,
                Axis::Y => 1,
            }
    }

    /// Evaluates this one partial at the given coordinates.
    pub fn evaluate(&self, coordinates: &[f64], p: &Matrix3x4<f64>) -> Result<f64> {
        let gradient = GradientEngine::new(self.metric, self.points)?.evaluate(coordinates, p)?;
        Ok(gradient.get(self.point, self.axis))
    }
}

/// The partial derivatives of a metric, one `(∂m/∂x, ∂m/∂y)` pair per point index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Gradient(pub Vec<Vector2<f64>>);

impl Gradient {
    /// Pairs up a flat `(∂x1, ∂y1, ∂x2, ∂y2, ...)` slice.
    pub fn from_coordinates(partials: &[f64]) -> Self {
        Self(
            partials
                .chunks_exact(2)
                .map(|d| Vector2::new(d[0], d[1]))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn point(&self, index: usize) -> Vector2<f64> {
        self.0[index]
    }

    pub fn get(&self, point: usize, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.0[point].x,
            Axis::Y => self.0[point].y,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Vector2<f64>)> + '_ {
        self.0.iter().copied().enumerate()
    }

    pub fn max_abs(&self) -> f64 {
        self.0.iter().map(|d| d.amax()).fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|d| d.x.is_finite() && d.y.is_finite())
    }

    /// Divides every partial by the largest absolute partial. A zero gradient is returned as is.
    pub fn normalized(&self) -> Self {
        let max = self.max_abs();
        if max > 0.0 {
            Self(self.0.iter().map(|d| d / max).collect())
        } else {
            self.clone()
        }
    }
}

/// Evaluates the gradient of one metric for a fixed number of points.
///
/// Only four and five points are supported, which fixes the size of the dual vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientEngine {
    metric: Metric,
    points: usize,
}

impl GradientEngine {
    pub fn new(metric: Metric, points: usize) -> Result<Self> {
        match points {
            4 | 5 => Ok(Self { metric, points }),
            n => Err(DltError::UnsupportedPointCount(n).into()),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// The `2N` partial derivatives this engine computes, in coordinate order.
    pub fn partials(&self) -> impl Iterator<Item = PartialDerivative> + '_ {
        (0..self.points).flat_map(move |point| {
            [Axis::X, Axis::Y].map(|axis| PartialDerivative {
                metric: self.metric,
                points: self.points,
                point,
                axis,
            })
        })
    }

    /// The value of the metric at the given coordinates.
    pub fn value(&self, coordinates: &[f64], p: &Matrix3x4<f64>) -> Result<f64> {
        let a = self.matrix(coordinates, p)?;
        Ok(self.metric.evaluate(&a)?)
    }

    /// Evaluates all partial derivatives in one forward-mode pass.
    ///
    /// Non-finite partials, which arise for rank-deficient configurations, are returned as they
    /// are; see [`Gradient::is_finite`].
    pub fn evaluate(&self, coordinates: &[f64], p: &Matrix3x4<f64>) -> Result<Gradient> {
        let a = self.matrix(coordinates, p)?;
        let gradient = match self.points {
            4 => self.evaluate_fixed::<8>(coordinates, p, &a)?,
            5 => self.evaluate_fixed::<10>(coordinates, p, &a)?,
            n => return Err(DltError::UnsupportedPointCount(n).into()),
        };
        trace!("{} gradient: {:?}", self.metric, gradient.0);
        Ok(gradient)
    }

    /// Validates the coordinates and builds the `f64` coefficient matrix, which also rules out
    /// degenerate projections before any dual numbers are involved.
    fn matrix(&self, coordinates: &[f64], p: &Matrix3x4<f64>) -> Result<DMatrix<f64>> {
        if coordinates.len() != 2 * self.points {
            return Err(GradientError::CoordinateCount {
                points: self.points,
                expected: 2 * self.points,
                actual: coordinates.len(),
            });
        }
        let object = ObjectPoints::from_coordinates(coordinates)?;
        Ok(coefficient_matrix_projected(&object, p)?)
    }

    fn evaluate_fixed<const D: usize>(
        &self,
        coordinates: &[f64],
        p: &Matrix3x4<f64>,
        a: &DMatrix<f64>,
    ) -> Result<Gradient> {
        let x = SVector::<f64, D>::from_column_slice(coordinates);
        let (_, partials) = match self.metric {
            Metric::ConfigurationMetric => gradient(
                |c: SVector<DualSVec64<D>, D>| configuration_metric(c.as_slice(), p),
                x,
            ),
            Metric::ConditionNumber => {
                let weights = ConditionDecomposition::new(a)?.sensitivity();
                gradient(
                    |c: SVector<DualSVec64<D>, D>| weighted_contraction(c.as_slice(), p, &weights),
                    x,
                )
            }
        };
        Ok(Gradient::from_coordinates(partials.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dlt_pinhole::Camera;

    #[test]
    fn only_four_or_five_points() {
        for n in [0, 3, 6, 9] {
            assert_eq!(
                GradientEngine::new(Metric::ConditionNumber, n),
                Err(GradientError::Dlt(DltError::UnsupportedPointCount(n)))
            );
        }
        assert!(GradientEngine::new(Metric::ConfigurationMetric, 5).is_ok());
    }

    #[test]
    fn coordinate_count_must_match() {
        let engine = GradientEngine::new(Metric::ConfigurationMetric, 5).unwrap();
        assert_eq!(
            engine.evaluate(&[0.0; 8], &Camera::reference().projection_matrix()),
            Err(GradientError::CoordinateCount {
                points: 5,
                expected: 10,
                actual: 8
            })
        );
    }

    #[test]
    fn partials_cover_every_coordinate() {
        let engine = GradientEngine::new(Metric::ConditionNumber, 5).unwrap();
        let coordinates: Vec<usize> = engine.partials().map(|d| d.coordinate()).collect();
        assert_eq!(coordinates, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn single_partial_matches_the_gradient() {
        let p = Camera::reference().projection_matrix();
        let coordinates = [0.1, 0.12, -0.14, 0.05, 0.07, -0.1, -0.09, -0.13];
        let engine = GradientEngine::new(Metric::ConfigurationMetric, 4).unwrap();
        let gradient = engine.evaluate(&coordinates, &p).unwrap();
        for partial in engine.partials() {
            assert_eq!(
                partial.evaluate(&coordinates, &p).unwrap(),
                gradient.get(partial.point, partial.axis)
            );
        }
    }

    #[test]
    fn normalization_scales_to_unit_max() {
        let gradient = Gradient(vec![Vector2::new(2.0, -8.0), Vector2::new(4.0, 1.0)]);
        let normalized = gradient.normalized();
        assert_eq!(normalized.max_abs(), 1.0);
        assert_relative_eq!(normalized.point(0), Vector2::new(0.25, -1.0));
        assert_relative_eq!(normalized.point(1), Vector2::new(0.5, 0.125));
    }

    #[test]
    fn zero_gradient_is_not_normalized() {
        let gradient = Gradient(vec![Vector2::zeros(); 4]);
        assert_eq!(gradient.normalized(), gradient);
    }

    #[test]
    fn metric_names_round_trip() {
        for metric in [Metric::ConditionNumber, Metric::ConfigurationMetric] {
            assert_eq!(metric.to_string().parse::<Metric>(), Ok(metric));
        }
        assert_eq!(
            "frobenius".parse::<Metric>(),
            Err(GradientError::UnknownMetric("frobenius".to_owned()))
        );
    }
}
