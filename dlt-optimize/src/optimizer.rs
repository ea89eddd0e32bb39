use crate::{OptimizeError, OptimizerSettings, Result};
use dlt_core::{coefficient_matrix, condition_number, configuration_metric, ObjectPoints};
use dlt_gradient::{Gradient, GradientEngine, Metric};
use dlt_pinhole::Camera;
use log::*;
use nalgebra::Matrix3x4;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Only the first four points are kept inside the clamping box.
const CLAMPED_POINTS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OptimizerState {
    /// No iteration has run yet.
    Init,
    /// The next iteration to run.
    Iterate { iteration: usize },
    /// Every iteration has run or an iteration failed.
    Terminated,
}

/// Conditioning of a configuration, computed from the coefficient matrix of its projection.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Diagnostics {
    pub condition_number: f64,
    pub configuration_metric: f64,
}

/// Projects the points through the camera without distortion and measures the conditioning of
/// the resulting coefficient matrix.
pub fn diagnostics(camera: &Camera, points: &ObjectPoints) -> Result<Diagnostics> {
    let image = camera.project(points, false)?;
    let a = coefficient_matrix(points, &image)?;
    Ok(Diagnostics {
        condition_number: condition_number(&a)?,
        configuration_metric: configuration_metric(&a)?,
    })
}

/// What happened in one iteration.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    /// The step size the update was made with
    pub step: f64,
    pub condition_number: f64,
    pub configuration_metric: f64,
    /// The gradient at the points the iteration started from, before any normalization
    pub gradient: Gradient,
    /// The points after the update
    pub points: ObjectPoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    /// Conditioning of the configuration the optimizer started from
    pub initial: Diagnostics,
    pub points: ObjectPoints,
    pub history: Vec<IterationRecord>,
}

impl OptimizationOutcome {
    /// Conditioning after the last iteration.
    pub fn last(&self) -> Diagnostics {
        self.history
            .last()
            .map(|record| Diagnostics {
                condition_number: record.condition_number,
                configuration_metric: record.configuration_metric,
            })
            .unwrap_or(self.initial)
    }
}

/// Gradient descent of a conditioning metric over the coordinates of four or five plane points.
///
/// The step size starts at [`OptimizerSettings::initial_step`] and grows by
/// [`OptimizerSettings::step_increment`] after every iteration. After each update the
/// coordinates of the first four points are clamped to `[-limit, limit]`; a fifth point moves
/// freely.
#[derive(Debug, Clone)]
pub struct Optimizer {
    settings: OptimizerSettings,
    camera: Camera,
    projection: Matrix3x4<f64>,
    engine: GradientEngine,
    points: ObjectPoints,
    step: f64,
    state: OptimizerState,
    history: Vec<IterationRecord>,
}

impl Optimizer {
    pub fn new(settings: OptimizerSettings, camera: Camera, initial: ObjectPoints) -> Result<Self> {
        settings.validate()?;
        let engine = GradientEngine::new(settings.metric, initial.len())?;
        Ok(Self {
            settings,
            projection: camera.projection_matrix(),
            camera,
            engine,
            points: initial,
            step: settings.initial_step,
            state: OptimizerState::Init,
            history: Vec::with_capacity(settings.iterations),
        })
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn metric(&self) -> Metric {
        self.settings.metric
    }

    pub fn points(&self) -> &ObjectPoints {
        &self.points
    }

    /// The step size the next iteration will use.
    pub fn step_size(&self) -> f64 {
        self.step
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Runs one iteration, returning its record, or `None` once the optimizer has terminated.
    ///
    /// An error terminates the optimizer and leaves the points and the step size as they were
    /// before the failed iteration.
    pub fn step(&mut self) -> Result<Option<&IterationRecord>> {
        let iteration = match self.state {
            OptimizerState::Init => 0,
            OptimizerState::Iterate { iteration } => iteration,
            OptimizerState::Terminated => return Ok(None),
        };
        if iteration >= self.settings.iterations {
            self.state = OptimizerState::Terminated;
            return Ok(None);
        }
        match self.iterate(iteration) {
            Ok(record) => {
                self.points = record.points.clone();
                self.history.push(record);
                self.state = if iteration + 1 < self.settings.iterations {
                    OptimizerState::Iterate {
                        iteration: iteration + 1,
                    }
                } else {
                    OptimizerState::Terminated
                };
                Ok(self.history.last())
            }
            Err(e) => {
                self.state = OptimizerState::Terminated;
                Err(e)
            }
        }
    }

    /// Runs every remaining iteration.
    pub fn run(mut self) -> Result<OptimizationOutcome> {
        let initial = diagnostics(&self.camera, &self.points)?;
        info!(
            "optimizing {} points on the {} for {} iterations, initial condition number {:e}, configuration metric {:e}",
            self.points.len(),
            self.settings.metric,
            self.settings.iterations,
            initial.condition_number,
            initial.configuration_metric
        );
        while self.step()?.is_some() {}
        Ok(OptimizationOutcome {
            initial,
            points: self.points,
            history: self.history,
        })
    }

    fn iterate(&mut self, iteration: usize) -> Result<IterationRecord> {
        let gradient = self
            .engine
            .evaluate(self.points.coordinates(), &self.projection)?;
        if !gradient.is_finite() {
            return Err(OptimizeError::NonFiniteGradient { iteration });
        }
        let direction = if self.settings.normalize_gradient {
            gradient.normalized()
        } else {
            gradient.clone()
        };

        let step = self.step;
        let limit = self.settings.limit;
        let mut points = self.points.clone();
        for (index, partial) in direction.iter() {
            let mut point = points.0.column_mut(index);
            point -= partial * step;
            if index < CLAMPED_POINTS {
                point.apply(|c| *c = c.clamp(-limit, limit));
            }
        }

        let Diagnostics {
            condition_number,
            configuration_metric,
        } = diagnostics(&self.camera, &points)?;
        self.step += self.settings.step_increment;
        if condition_number.is_infinite() {
            warn!(
                "coefficient matrix lost rank at iteration {}, condition number is infinite",
                iteration
            );
        }
        info!(
            "iteration {} step {:e} condition number {:e} configuration metric {:e}",
            iteration, step, condition_number, configuration_metric
        );
        for (index, partial) in gradient.iter() {
            debug!(
                "point {} gradient ({:e}, {:e})",
                index + 1,
                partial.x,
                partial.y
            );
        }

        Ok(IterationRecord {
            iteration,
            step,
            condition_number,
            configuration_metric,
            gradient,
            points,
        })
    }
}
