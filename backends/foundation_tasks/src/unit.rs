//! The two kinds of execution unit a supervisor can drive.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use derive_more::Display;
use foundation_sync::{Event, StreamEndpoint};

use crate::errors::panic_message;
use crate::{CancellationFlag, TaskError};

/// How often a timed wait on a child process polls for its exit.
const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Pipe to a worker process: reads its stdout, writes its stdin.
pub type ProcessEndpoint = StreamEndpoint<ChildStdout, ChildStdin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnitKind {
    #[display("thread")]
    Thread,
    #[display("process")]
    Process,
}

/// What a [`crate::TaskSupervisor`] needs from the thing it supervises.
///
/// The supervisor owns the state machine; a backend only knows how to
/// launch, wait for, stop and read back one unit of its kind.
pub trait UnitBackend: Send {
    type Output: Send;

    fn kind(&self) -> UnitKind;

    /// Starts the unit. Called at most once.
    ///
    /// # Errors
    ///
    /// [`TaskError::Spawn`] when the OS refuses to create the unit.
    fn launch(&mut self, name: &str) -> Result<(), TaskError>;

    /// Waits for the unit to finish, for at most `timeout` (`None` waits
    /// forever). Returns whether it finished.
    ///
    /// # Errors
    ///
    /// Propagates OS failures while waiting.
    fn wait(&mut self, timeout: Option<Duration>) -> Result<bool, TaskError>;

    /// Non-blocking check for completion.
    fn is_finished(&mut self) -> bool;

    /// Requests a forced stop.
    ///
    /// # Errors
    ///
    /// Propagates OS failures while signalling the unit.
    fn kill(&mut self) -> Result<(), TaskError>;

    /// Gives up on the unit without waiting for it to finish.
    fn abandon(&mut self) {
        if let Err(err) = self.kill() {
            tracing::warn!(error = %err, "failed to stop abandoned unit");
        }
    }

    /// The unit's result, available once it has finished.
    fn take_output(&mut self) -> Option<Result<Self::Output, TaskError>>;
}

type Body<T> = Box<dyn FnOnce(CancellationFlag) -> Result<T, TaskError> + Send>;

/// Sets the event when the unit's thread exits, including by unwinding.
struct FinishOnDrop(Arc<Event>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// A closure run on a dedicated OS thread.
///
/// Threads cannot be killed; [`UnitBackend::kill`] raises the
/// [`CancellationFlag`] the closure was given and the closure decides when to
/// stop. Panics in the closure become [`TaskError::Panicked`].
pub struct ThreadUnit<T> {
    body: Option<Body<T>>,
    cancel: CancellationFlag,
    finished: Arc<Event>,
    handle: Option<JoinHandle<Result<T, TaskError>>>,
    output: Option<Result<T, TaskError>>,
}

impl<T: Send + 'static> ThreadUnit<T> {
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(CancellationFlag) -> Result<T, TaskError> + Send + 'static,
    {
        Self {
            body: Some(Box::new(body)),
            cancel: CancellationFlag::new(),
            finished: Arc::new(Event::new()),
            handle: None,
            output: None,
        }
    }

    /// The flag handed to the closure.
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    fn collect(&mut self) {
        if let Some(handle) = self.handle.take() {
            let output = handle.join().unwrap_or_else(|payload| {
                Err(TaskError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });
            self.output = Some(output);
        }
    }
}

impl<T: Send + 'static> UnitBackend for ThreadUnit<T> {
    type Output = T;

    fn kind(&self) -> UnitKind {
        UnitKind::Thread
    }

    fn launch(&mut self, name: &str) -> Result<(), TaskError> {
        let Some(body) = self.body.take() else {
            return Err(TaskError::InvalidArgument(format!(
                "thread unit {name} was already launched"
            )));
        };
        let cancel = self.cancel.clone();
        let finished = FinishOnDrop(Arc::clone(&self.finished));

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _finished = finished;
                catch_unwind(AssertUnwindSafe(|| body(cancel))).unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(%message, "thread unit panicked");
                    Err(TaskError::Panicked { message })
                })
            })
            .map_err(TaskError::Spawn)?;
        self.handle = Some(handle);
        Ok(())
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<bool, TaskError> {
        let finished = match timeout {
            None => {
                self.finished.wait();
                true
            }
            Some(timeout) => self.finished.wait_timeout(timeout),
        };
        if finished {
            self.collect();
        }
        Ok(finished)
    }

    fn is_finished(&mut self) -> bool {
        self.finished.is_set()
    }

    fn kill(&mut self) -> Result<(), TaskError> {
        self.cancel.cancel();
        Ok(())
    }

    fn abandon(&mut self) {
        self.cancel.cancel();
        // Dropping the handle detaches the thread.
        self.handle = None;
    }

    fn take_output(&mut self) -> Option<Result<T, TaskError>> {
        if self.finished.is_set() {
            self.collect();
        }
        self.output.take()
    }
}

/// A child process.
///
/// [`ProcessUnit::piped`] connects the child's stdin and stdout so the parent
/// can talk to it through [`ProcessUnit::take_endpoint`].
pub struct ProcessUnit {
    command: Command,
    piped: bool,
    child: Option<Child>,
    status: Option<ExitStatus>,
    endpoint: Option<ProcessEndpoint>,
}

impl ProcessUnit {
    /// A child that inherits this process's stdio.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            piped: false,
            child: None,
            status: None,
            endpoint: None,
        }
    }

    /// A child whose stdin/stdout form a message channel with the parent.
    #[must_use]
    pub fn piped(mut command: Command) -> Self {
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        Self {
            piped: true,
            ..Self::new(command)
        }
    }

    /// Hands out the parent's end of the pipe, once, after launch.
    pub fn take_endpoint(&mut self) -> Option<ProcessEndpoint> {
        self.endpoint.take()
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// The exit status, once observed.
    #[must_use]
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    fn poll(&mut self) -> Result<bool, TaskError> {
        if self.status.is_some() {
            return Ok(true);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };
        self.status = child.try_wait()?;
        Ok(self.status.is_some())
    }
}

impl UnitBackend for ProcessUnit {
    type Output = ExitStatus;

    fn kind(&self) -> UnitKind {
        UnitKind::Process
    }

    fn launch(&mut self, name: &str) -> Result<(), TaskError> {
        if self.child.is_some() {
            return Err(TaskError::InvalidArgument(format!(
                "process unit {name} was already launched"
            )));
        }
        let mut child = self.command.spawn().map_err(TaskError::Spawn)?;
        tracing::debug!(unit = name, pid = child.id(), "process unit spawned");
        if self.piped {
            if let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) {
                self.endpoint = Some(StreamEndpoint::new(stdout, stdin));
            }
        }
        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<bool, TaskError> {
        if self.status.is_some() {
            return Ok(true);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };

        // A limit too far out to represent is no limit at all.
        let Some(deadline) = timeout.and_then(|timeout| Instant::now().checked_add(timeout)) else {
            self.status = Some(child.wait()?);
            return Ok(true);
        };

        loop {
            if self.poll()? {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            thread::sleep(remaining.min(PROCESS_POLL_INTERVAL));
        }
    }

    fn is_finished(&mut self) -> bool {
        self.poll().unwrap_or(false)
    }

    fn kill(&mut self) -> Result<(), TaskError> {
        if self.poll()? {
            return Ok(());
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        match child.kill() {
            Ok(()) => {
                tracing::warn!(pid = child.id(), "process unit killed");
                Ok(())
            }
            // Already exited between the poll and the kill.
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn abandon(&mut self) {
        match self.kill().and_then(|()| self.wait(None)) {
            Ok(_) => tracing::debug!(pid = ?self.id(), "abandoned process unit reaped"),
            Err(err) => tracing::warn!(error = %err, "failed to reap abandoned process unit"),
        }
    }

    fn take_output(&mut self) -> Option<Result<ExitStatus, TaskError>> {
        self.status.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_unit_reports_value() {
        let mut unit = ThreadUnit::new(|_| Ok(21 * 2));
        unit.launch("answer").unwrap();
        assert!(unit.wait(None).unwrap());
        assert!(unit.is_finished());
        assert_eq!(unit.take_output().unwrap().unwrap(), 42);
        assert!(unit.take_output().is_none());
    }

    #[test]
    fn thread_unit_converts_panics() {
        let mut unit: ThreadUnit<()> = ThreadUnit::new(|_| panic!("kaboom"));
        unit.launch("panicky").unwrap();
        unit.wait(None).unwrap();
        match unit.take_output() {
            Some(Err(TaskError::Panicked { message })) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn thread_unit_observes_kill_through_flag() {
        let mut unit: ThreadUnit<()> = ThreadUnit::new(|cancel: CancellationFlag| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Err(TaskError::Terminated)
        });
        unit.launch("spinner").unwrap();
        assert!(!unit.wait(Some(Duration::from_millis(20))).unwrap());
        unit.kill().unwrap();
        assert!(unit.wait(Some(Duration::from_secs(5))).unwrap());
        assert!(matches!(unit.take_output(), Some(Err(TaskError::Terminated))));
    }

    #[test]
    fn thread_unit_launches_once() {
        let mut unit = ThreadUnit::new(|_| Ok(()));
        unit.launch("once").unwrap();
        assert!(matches!(
            unit.launch("once"),
            Err(TaskError::InvalidArgument(_))
        ));
        unit.wait(None).unwrap();
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let mut unit = ProcessUnit::new(Command::new("/nonexistent/definitely-not-here"));
        assert!(matches!(unit.launch("ghost"), Err(TaskError::Spawn(_))));
        assert!(!unit.wait(Some(Duration::ZERO)).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn process_wait_accepts_unrepresentable_timeout() {
        let mut unit = ProcessUnit::new(Command::new("true"));
        unit.launch("quick").unwrap();
        assert!(unit.wait(Some(Duration::MAX)).unwrap());
        assert!(unit.take_output().unwrap().unwrap().success());
        // Already reaped: answers without touching the clock.
        assert!(unit.wait(Some(Duration::MAX)).unwrap());
    }
}
