use thiserror::Error;

/// Errors raised while building or evaluating a DLT coefficient matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DltError {
    #[error("need at least {minimum} points, got {actual}")]
    NotEnoughPoints { minimum: usize, actual: usize },
    #[error("got {object} object points but {image} image points")]
    PointCountMismatch { object: usize, image: usize },
    #[error("only 4 or 5 points are supported here, got {0}")]
    UnsupportedPointCount(usize),
    #[error("coordinate slice of length {0} does not describe whole points")]
    OddCoordinateCount(usize),
    #[error("expected a 2N×9 coefficient matrix with N >= 4, got {rows}×{cols}")]
    MatrixShape { rows: usize, cols: usize },
    #[error("point {index} projects with a homogeneous scale of {scale:e}")]
    DegenerateProjection { index: usize, scale: f64 },
    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },
    #[error("coefficient matrix has a non-finite entry at ({row}, {col})")]
    NonFiniteMatrix { row: usize, col: usize },
    #[error("singular value decomposition did not converge")]
    SvdFailed,
    #[error("eigen decomposition did not converge")]
    EigenFailed,
    #[error("points are coincident and cannot be normalized")]
    CoincidentPoints,
    #[error("homography is singular")]
    SingularHomography,
}

pub type Result<T> = std::result::Result<T, DltError>;
