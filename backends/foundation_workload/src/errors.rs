use thiserror::Error;

/// Errors produced by the workload itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadError {
    /// The requested size was negative.
    #[error("invalid workload size {size}: size must be >= 0")]
    InvalidArgument {
        /// The rejected size.
        size: i64,
    },

    /// The cancellation predicate fired before the computation finished.
    #[error("workload cancelled before completion")]
    Cancelled,
}

impl WorkloadError {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkloadError::InvalidArgument { .. } => "workload_invalid_argument",
            WorkloadError::Cancelled => "workload_cancelled",
        }
    }
}
