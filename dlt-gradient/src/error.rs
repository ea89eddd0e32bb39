use dlt_core::DltError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradientError {
    #[error(transparent)]
    Dlt(#[from] DltError),
    #[error("{points} points need {expected} coordinates, got {actual}")]
    CoordinateCount {
        points: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown metric {0:?}, expected \"condition-number\" or \"configuration-metric\"")]
    UnknownMetric(String),
}

pub type Result<T> = std::result::Result<T, GradientError>;
