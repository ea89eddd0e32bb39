//! Moves calibration points around the plane to improve how well their DLT coefficient matrix is
//! conditioned.
//!
//! The [`Optimizer`] descends the gradient of a [`Metric`](dlt_gradient::Metric) with a step size
//! that grows by a fixed increment every iteration, clamps the points to a box around the plane
//! center and records the conditioning of the re-projected configuration after every step. There is
//! no convergence criterion: the optimizer always runs for the configured number of iterations.
//!
//! [`error_bounds`] estimates, by Monte-Carlo simulation of image noise, how much a configuration
//! actually perturbs the estimated homography, alongside the perturbation bounds that follow from
//! the conditioning number.

mod bounds;
mod error;
mod optimizer;
mod settings;

pub use bounds::*;
pub use error::*;
pub use optimizer::*;
pub use settings::*;
