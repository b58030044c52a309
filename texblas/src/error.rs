//! Error types for the tensor engine.

use texblas_backend::BackendError;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TensorError>;

/// Failure kinds surfaced by tensor operations.
///
/// Every failure is terminal for the operation that produced it; there is no
/// retry anywhere in this layer. Shape problems are detected before any GPU
/// resource is touched.
#[derive(Error, Debug)]
pub enum TensorError {
    /// Malformed input length, mismatched operand dimensions, or an
    /// unsupported shape for a kernel.
    #[error("shape error: {0}")]
    Shape(String),

    /// Double free, use after release, or a backend allocation/dispatch
    /// failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// Malformed external data passed through to the engine.
    #[error("data error: {0}")]
    Data(String),
}

impl From<BackendError> for TensorError {
    fn from(err: BackendError) -> Self {
        TensorError::Resource(err.to_string())
    }
}

impl TensorError {
    /// True for the shape-validation kind.
    pub fn is_shape(&self) -> bool {
        matches!(self, TensorError::Shape(_))
    }

    /// True for the resource-misuse / backend-failure kind.
    pub fn is_resource(&self) -> bool {
        matches!(self, TensorError::Resource(_))
    }
}
