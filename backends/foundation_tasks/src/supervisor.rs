//! Lifecycle state machine over one execution unit.

use std::process::Command;
use std::time::Duration;

use derive_more::Display;

use crate::unit::{ProcessEndpoint, ProcessUnit, ThreadUnit, UnitBackend, UnitKind};
use crate::{CancellationFlag, TaskError};

/// Where a supervised unit is in its lifecycle, as seen by its supervisor.
///
/// `TimedOut` is only the caller's view after a bounded join gave up: the
/// unit itself keeps running and can still complete or be terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnitState {
    #[display("created")]
    Created,
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("timed out")]
    TimedOut,
    #[display("terminated")]
    Terminated,
}

impl UnitState {
    /// Whether the unit was launched and not yet observed stopping.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, UnitState::Running | UnitState::TimedOut)
    }
}

/// Result of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The unit is no longer running.
    Finished,
    /// The wait limit elapsed first; the unit is still running.
    TimedOut,
}

impl JoinOutcome {
    #[must_use]
    pub const fn is_timed_out(self) -> bool {
        matches!(self, JoinOutcome::TimedOut)
    }
}

/// Drives one execution unit through
/// `Created -> Running -> {Completed, TimedOut, Terminated}`.
///
/// ```
/// use foundation_tasks::{TaskSupervisor, UnitState};
///
/// let mut unit = TaskSupervisor::thread("adder", |_cancel| Ok(2 + 2));
/// unit.start().unwrap();
/// unit.join().unwrap();
/// assert_eq!(unit.state(), UnitState::Completed);
/// assert_eq!(unit.take_output().unwrap().unwrap(), 4);
/// ```
pub struct TaskSupervisor<B> {
    name: String,
    backend: B,
    state: UnitState,
    background: bool,
}

impl<B: UnitBackend> TaskSupervisor<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend,
            state: UnitState::Created,
            background: false,
        }
    }

    /// Marks the unit as background: an enclosing [`crate::Scope`] abandons it
    /// on exit instead of waiting for it.
    #[must_use]
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn is_background(&self) -> bool {
        self.background
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> UnitState {
        self.state
    }

    #[must_use]
    pub fn kind(&self) -> UnitKind {
        self.backend.kind()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn invalid(&self, operation: &'static str) -> TaskError {
        TaskError::InvalidTransition {
            from: self.state,
            operation,
        }
    }

    /// `Created -> Running`.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] from any other state, or
    /// [`TaskError::Spawn`] if the unit could not be created.
    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.state != UnitState::Created {
            return Err(self.invalid("start"));
        }
        self.backend.launch(&self.name)?;
        self.state = UnitState::Running;
        tracing::debug!(unit = %self.name, kind = %self.kind(), background = self.background, "unit started");
        Ok(())
    }

    /// Blocks until the unit stops. Returns at once for a completed unit;
    /// after [`TaskSupervisor::terminate`] it waits for the forced stop to be
    /// observed, reaping the unit.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] for a unit that was never started.
    pub fn join(&mut self) -> Result<JoinOutcome, TaskError> {
        self.join_for(None)
    }

    /// Like [`TaskSupervisor::join`], but gives up after `timeout`. Giving up
    /// moves the state to [`UnitState::TimedOut`] and leaves the unit running.
    ///
    /// # Errors
    ///
    /// As for [`TaskSupervisor::join`].
    pub fn join_timeout(&mut self, timeout: Duration) -> Result<JoinOutcome, TaskError> {
        self.join_for(Some(timeout))
    }

    fn join_for(&mut self, timeout: Option<Duration>) -> Result<JoinOutcome, TaskError> {
        match self.state {
            UnitState::Created => Err(self.invalid("join")),
            UnitState::Completed => Ok(JoinOutcome::Finished),
            UnitState::Running | UnitState::TimedOut | UnitState::Terminated => {
                if !self.backend.wait(timeout)? {
                    if self.state != UnitState::Terminated {
                        self.state = UnitState::TimedOut;
                    }
                    tracing::debug!(unit = %self.name, ?timeout, "join timed out, unit still running");
                    return Ok(JoinOutcome::TimedOut);
                }
                if self.state != UnitState::Terminated {
                    self.state = UnitState::Completed;
                }
                tracing::debug!(unit = %self.name, state = %self.state, "unit joined");
                Ok(JoinOutcome::Finished)
            }
        }
    }

    /// Forcibly stops a running unit: kills a process, raises a thread's
    /// cancellation flag. Follow with [`TaskSupervisor::join`] to reap it.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] unless the unit is running (or was
    /// last seen timing out).
    pub fn terminate(&mut self) -> Result<(), TaskError> {
        if !self.state.is_started() {
            return Err(self.invalid("terminate"));
        }
        self.backend.kill()?;
        self.state = UnitState::Terminated;
        tracing::info!(unit = %self.name, kind = %self.kind(), "unit terminated");
        Ok(())
    }

    /// True while the unit was started, has not finished and was not
    /// terminated.
    pub fn is_alive(&mut self) -> bool {
        self.state.is_started() && !self.backend.is_finished()
    }

    /// The unit's output once it completed; [`TaskError::Terminated`] for a
    /// terminated unit; `None` while it is still running.
    pub fn take_output(&mut self) -> Option<Result<B::Output, TaskError>> {
        match self.state {
            UnitState::Completed => self.backend.take_output(),
            UnitState::Terminated => Some(Err(TaskError::Terminated)),
            _ => None,
        }
    }

    /// Gives up on the unit without waiting: see [`UnitBackend::abandon`].
    pub(crate) fn abandon(&mut self) {
        if self.state.is_started() {
            tracing::info!(unit = %self.name, kind = %self.kind(), "abandoning background unit");
            self.backend.abandon();
        }
    }
}

impl<T: Send + 'static> TaskSupervisor<ThreadUnit<T>> {
    /// Supervises `body` on its own thread. The body receives the flag that
    /// [`TaskSupervisor::terminate`] raises.
    pub fn thread<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(CancellationFlag) -> Result<T, TaskError> + Send + 'static,
    {
        Self::new(name, ThreadUnit::new(body))
    }

    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.backend.cancellation()
    }
}

impl TaskSupervisor<ProcessUnit> {
    /// Supervises a child process inheriting this process's stdio.
    pub fn process(name: impl Into<String>, command: Command) -> Self {
        Self::new(name, ProcessUnit::new(command))
    }

    /// Supervises a child process connected to this one by a pipe.
    pub fn piped_process(name: impl Into<String>, command: Command) -> Self {
        Self::new(name, ProcessUnit::piped(command))
    }

    /// The parent's end of the pipe of a started piped process.
    pub fn take_endpoint(&mut self) -> Option<ProcessEndpoint> {
        self.backend.take_endpoint()
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.backend.id()
    }
}
