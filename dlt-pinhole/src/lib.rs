//! This crate provides the simulated collaborators of the DLT experiments: a pinhole camera
//! looking at the calibration plane `z = 0` and the plane itself, which can lay out calibration
//! points as a uniform grid or sample them at random.
//!
//! The camera projects [`dlt_core::ObjectPoints`] through `P = K [R | t]`, optionally applying one
//! radial distortion coefficient (K1), and knows the ground truth homography `K [r1 r2 t]` that a
//! DLT estimate from its projections should recover.

mod camera;
mod error;
mod plane;

pub use camera::*;
pub use error::*;
pub use plane::*;
