//! # DLT Core
//!
//! This library provides the types and the numerics shared by every crate of the workspace that
//! reasons about how sensitive a planar homography estimate is to the layout of its calibration
//! points. The homography is estimated with the
//! [Direct Linear Transform](https://en.wikipedia.org/wiki/Direct_linear_transformation), which
//! solves `A·h = 0` for the nine entries `h` of the homography. The coefficient matrix `A` only
//! depends on the object points and on where they land in the image, so its numerical quality
//! tells us how well a given point configuration constrains the homography.
//!
//! The crate is split into:
//!
//! * [`ObjectPoints`] and [`ImagePoints`], the planar calibration points and their projections
//! * the matrix builder ([`coefficient_matrix`], [`coefficient_matrix_projected`])
//! * the quality metrics ([`condition_number`], [`configuration_metric`])
//! * homography estimation and error measures ([`dlt_homography`], [`geometric_distance`], ...)
//!
//! Given the object points `X_i = (x_i, y_i, 0, 1)` on the plane `z = 0` and their image points
//! `(u_i, v_i)`, every correspondence contributes two rows to `A`:
//!
//! ```text
//! row 2i   = [  0,   0, 0, -x_i, -y_i, -1,  v_i*x_i,  v_i*y_i,  v_i]
//! row 2i+1 = [x_i, y_i, 1,    0,    0,  0, -u_i*x_i, -u_i*y_i, -u_i]
//! ```

mod error;
#[cfg(test)]
mod fixtures;
mod homography;
mod matrix;
mod metrics;
mod point;

pub use error::*;
pub use homography::*;
pub use matrix::*;
pub use metrics::*;
pub use nalgebra;
pub use point::*;
