//! Error types for SVM implementation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Model not trained")]
    NotTrained,

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Solver failure: {0}")]
    SolverFailure(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Training worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Training gateway is closed")]
    GatewayClosed,
}

impl SVMError {
    /// Re-tag an error raised while training a cross-validation fold.
    ///
    /// Errors that already describe a solver rejection keep their message.
    pub(crate) fn into_solver_failure(self, context: &str) -> Self {
        match self {
            SVMError::SolverFailure(msg) => SVMError::SolverFailure(format!("{context}: {msg}")),
            other => SVMError::SolverFailure(format!("{context}: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_solver_failure_wraps_message() {
        let err = SVMError::InvalidArgument("only one class".to_string());
        match err.into_solver_failure("fold 3") {
            SVMError::SolverFailure(msg) => {
                assert!(msg.contains("fold 3"));
                assert!(msg.contains("only one class"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SVMError = io.into();
        assert!(matches!(err, SVMError::IoError(_)));
    }
}
