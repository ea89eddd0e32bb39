//! Gradients of the DLT quality metrics with respect to the coordinates of the calibration points.
//!
//! The [`differentiable`] module restates the matrix builder and the configuration metric as
//! closed-form functions of the flat coordinate vector `(x1, y1, x2, y2, ...)`, generic over a
//! [`nalgebra::RealField`] scalar. Evaluated with `f64` they agree with `dlt-core`. Evaluated with
//! the forward-mode dual vectors of [`num_dual`] they yield every partial derivative in one pass.
//!
//! The conditioning number is not differentiated through an SVD. Instead the analytic sensitivity
//! `∂κ/∂A` is contracted with the coefficient matrix, and only that contraction is differentiated
//! with respect to the coordinates.
//!
//! ```
//! use dlt_gradient::{GradientEngine, Metric};
//! use dlt_pinhole::Camera;
//!
//! let camera = Camera::reference();
//! let engine = GradientEngine::new(Metric::ConfigurationMetric, 4).unwrap();
//! let coordinates = [0.1, 0.1, -0.1, 0.1, 0.1, -0.1, -0.1, -0.1];
//! let gradient = engine
//!     .evaluate(&coordinates, &camera.projection_matrix())
//!     .unwrap();
//! assert_eq!(gradient.len(), 4);
//! assert!(gradient.is_finite());
//! ```

pub mod differentiable;
mod error;
mod gradient;

pub use error::*;
pub use gradient::*;
