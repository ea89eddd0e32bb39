use dlt_core::DltError;
use dlt_gradient::GradientError;
use dlt_pinhole::CameraError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    #[error(transparent)]
    Dlt(#[from] DltError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Gradient(#[from] GradientError),
    #[error("gradient is not finite at iteration {iteration}")]
    NonFiniteGradient { iteration: usize },
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
