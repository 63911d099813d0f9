//! Records exchanged with a process-isolated worker, one JSON value per line.

use serde::{Deserialize, Serialize};

use crate::{Task, TaskId, WorkResult, WorkloadError};

/// A message from the supervising process to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkRequest {
    /// Run the task and reply with its result.
    Run(Task),
    /// Sentinel: the worker replies to nothing further and exits.
    Stop,
}

/// A worker's answer to one [`WorkRequest::Run`].
///
/// Failures cross the process boundary as their display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkReply {
    pub id: TaskId,
    pub outcome: Result<WorkResult, String>,
}

impl WorkReply {
    #[must_use]
    pub fn from_outcome(id: TaskId, outcome: Result<WorkResult, WorkloadError>) -> Self {
        Self {
            id,
            outcome: outcome.map_err(|err| err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_request_is_tagged() {
        let encoded = serde_json::to_string(&WorkRequest::Stop).unwrap();
        assert_eq!(encoded, r#"{"kind":"stop"}"#);
    }

    #[test]
    fn run_request_carries_task_fields() {
        let encoded = serde_json::to_string(&WorkRequest::Run(Task::new(4u64, 12))).unwrap();
        assert_eq!(encoded, r#"{"kind":"run","id":4,"size":12}"#);
        let decoded: WorkRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, WorkRequest::Run(Task::new(4u64, 12)));
    }

    #[test]
    fn failed_reply_keeps_error_text() {
        let reply = WorkReply::from_outcome(
            TaskId::new(2),
            Err(WorkloadError::InvalidArgument { size: -5 }),
        );
        assert_eq!(
            reply.outcome,
            Err("invalid workload size -5: size must be >= 0".to_string())
        );
    }
}
