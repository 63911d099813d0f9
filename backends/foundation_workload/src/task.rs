use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::{compute, WorkResult, WorkloadError};

/// Identifier a producer attaches to each piece of work.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display("task-{_0}")]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// A workload size paired with the identifier of the task that asked for it.
///
/// Tasks are plain data: they move from a producer to exactly one consumer
/// through a queue or channel and carry no behaviour of their own beyond
/// [`Task::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    size: i64,
}

impl Task {
    #[must_use]
    pub fn new(id: impl Into<TaskId>, size: i64) -> Self {
        Self {
            id: id.into(),
            size,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub const fn size(&self) -> i64 {
        self.size
    }

    /// Runs the workload for this task's size.
    ///
    /// # Errors
    ///
    /// Propagates [`WorkloadError`] from [`compute`].
    pub fn run(&self) -> Result<WorkResult, WorkloadError> {
        compute(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_displays_with_prefix() {
        assert_eq!(TaskId::new(7).to_string(), "task-7");
        assert_eq!(TaskId::from(3u64).get(), 3);
    }

    #[test]
    fn run_delegates_to_compute() {
        let task = Task::new(1u64, 10);
        assert_eq!(task.run(), compute(10));
        assert_eq!(task.id(), TaskId::new(1));
        assert_eq!(task.size(), 10);
    }
}
