use dlt_core::DltError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CameraError {
    #[error(transparent)]
    Dlt(#[from] DltError),
    #[error("rotation axis must not be the zero vector")]
    ZeroRotationAxis,
    #[error("point {index} is too far from the optical axis for k1 = {k1}")]
    DistortionOutOfRange { index: usize, k1: f64 },
    #[error("image noise needs a finite, non-negative standard deviation, got {0}")]
    InvalidNoise(f64),
    #[error("could not place {count} points {min_separation} apart within radius {radius} after {attempts} attempts")]
    SamplingFailed {
        count: usize,
        radius: f64,
        min_separation: f64,
        attempts: usize,
    },
    #[error("plane extent must be positive, got {width}×{height}")]
    InvalidPlane { width: f64, height: f64 },
}

pub type Result<T> = std::result::Result<T, CameraError>;
