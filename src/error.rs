use thiserror::Error;

/// Inertial tracker error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Invalid matrix dimension: {0}")]
    InvalidDimension(String),

    #[error("Matrix index out of range: ({row}, {col})")]
    IndexOutOfRange { row: usize, col: usize },

    #[error("Singular matrix (determinant {determinant:e})")]
    SingularMatrix { determinant: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for matrix, filter and tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
