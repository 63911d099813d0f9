use std::any::Any;
use std::time::Duration;

use foundation_sync::SyncError;
use foundation_workload::WorkloadError;
use thiserror::Error;

use crate::UnitState;

/// Failures of supervised units and the worker pool.
///
/// A job's own failure is isolated to its result slot as
/// [`TaskError::Failed`] or [`TaskError::Panicked`]; it never tears down the
/// pool or sibling jobs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The job returned an error; carries its description.
    #[error("task failed: {error}")]
    Failed { error: String },

    /// The job panicked; carries the panic message when it was a string.
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// A worker process overran the limit given to `run_in_process_timeout`.
    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The unit was stopped through `terminate` before producing output.
    #[error("execution unit was terminated")]
    Terminated,

    #[error("worker pool is shut down")]
    PoolShutdown,

    #[error("cannot {operation} a unit that is {from}")]
    InvalidTransition {
        from: UnitState,
        operation: &'static str,
    },

    #[error("failed to spawn execution unit: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::InvalidArgument(_) => "task_invalid_argument",
            TaskError::Failed { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Terminated => "task_terminated",
            TaskError::PoolShutdown => "task_pool_shutdown",
            TaskError::InvalidTransition { .. } => "task_invalid_transition",
            TaskError::Spawn(_) => "task_spawn",
            TaskError::Sync(inner) => inner.as_label(),
            TaskError::Workload(inner) => inner.as_label(),
        }
    }

    /// Whether the error came from the job itself rather than the machinery
    /// running it.
    #[must_use]
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            TaskError::Failed { .. } | TaskError::Panicked { .. } | TaskError::Workload(_)
        )
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::Sync(SyncError::Io(err))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_keep_their_labels() {
        let err = TaskError::from(SyncError::ChannelClosed);
        assert_eq!(err.as_label(), "sync_channel_closed");
        let err = TaskError::from(WorkloadError::InvalidArgument { size: -2 });
        assert_eq!(err.as_label(), "workload_invalid_argument");
        assert!(err.is_task_failure());
        assert!(!TaskError::PoolShutdown.is_task_failure());
    }

    #[test]
    fn transition_error_names_the_state() {
        let err = TaskError::InvalidTransition {
            from: UnitState::Created,
            operation: "terminate",
        };
        assert_eq!(err.to_string(), "cannot terminate a unit that is created");
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
