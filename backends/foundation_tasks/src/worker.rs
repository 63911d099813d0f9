//! The request/reply loop a process-isolated worker runs, and the parent
//! side that drives it.

use std::io::{Read, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use foundation_sync::{StreamEndpoint, SyncError};
use foundation_workload::{Task, WorkReply, WorkRequest, WorkResult};

use crate::{TaskError, TaskSupervisor};

/// Subcommand the worker binary answers to.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Serves [`WorkRequest`]s from `endpoint` until a stop request or end of
/// stream, replying to each run request in order. Returns how many tasks
/// were served.
///
/// A task whose workload fails still gets a reply carrying the error text.
///
/// # Errors
///
/// Channel failures other than a clean close.
pub fn serve_worker<R: Read, W: Write>(
    endpoint: &mut StreamEndpoint<R, W>,
) -> Result<usize, TaskError> {
    let mut served = 0;
    loop {
        match endpoint.receive::<WorkRequest>() {
            Ok(WorkRequest::Run(task)) => {
                let reply = WorkReply::from_outcome(task.id(), task.run());
                endpoint.send(&reply)?;
                served += 1;
            }
            Ok(WorkRequest::Stop) => {
                tracing::debug!(served, "worker received stop");
                break;
            }
            Err(SyncError::ChannelClosed) => {
                tracing::debug!(served, "worker input closed");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    endpoint.close()?;
    Ok(served)
}

/// The command that starts `program` in worker mode.
#[must_use]
pub fn worker_command(program: &Path) -> Command {
    let mut command = Command::new(program);
    command.arg(WORKER_SUBCOMMAND);
    command
}

/// Runs one task in a fresh worker process and returns its result.
///
/// The task and a stop request go down the pipe, the reply comes back, and
/// the child is joined before returning.
///
/// # Errors
///
/// [`TaskError::Spawn`] if the worker cannot be started,
/// [`TaskError::Failed`] if the workload failed in the child or the child
/// exited unsuccessfully, and channel errors if the pipe broke.
#[tracing::instrument(level = "debug", skip(program), fields(task = %task.id()))]
pub fn run_in_process(program: &Path, task: Task) -> Result<WorkResult, TaskError> {
    exchange_with_worker(program, task, None)
}

/// Like [`run_in_process`], but gives the worker at most `timeout` to
/// finish. A worker still running then is terminated and reaped.
///
/// # Errors
///
/// [`TaskError::Timeout`] when the limit elapsed, otherwise as for
/// [`run_in_process`].
#[tracing::instrument(level = "debug", skip(program), fields(task = %task.id()))]
pub fn run_in_process_timeout(
    program: &Path,
    task: Task,
    timeout: Duration,
) -> Result<WorkResult, TaskError> {
    exchange_with_worker(program, task, Some(timeout))
}

fn exchange_with_worker(
    program: &Path,
    task: Task,
    timeout: Option<Duration>,
) -> Result<WorkResult, TaskError> {
    let mut unit = TaskSupervisor::piped_process(format!("worker-{}", task.id()), worker_command(program));
    unit.start()?;
    let mut endpoint = unit
        .take_endpoint()
        .ok_or(TaskError::Sync(SyncError::ChannelClosed))?;

    let sent = endpoint
        .send(&WorkRequest::Run(task))
        .and_then(|()| endpoint.send(&WorkRequest::Stop));
    if let Err(err) = sent {
        // A broken pipe leaves the child in an unknown state.
        unit.terminate()?;
        unit.join()?;
        return Err(err.into());
    }

    // One reply line fits the pipe buffer, so the worker can exit before
    // it is read.
    if let Some(timeout) = timeout {
        if unit.join_timeout(timeout)?.is_timed_out() {
            tracing::warn!(?timeout, "worker exceeded its time limit");
            unit.terminate()?;
            unit.join()?;
            return Err(TaskError::Timeout { timeout });
        }
    }

    let reply = endpoint.receive::<WorkReply>();
    if let Err(err) = endpoint.close() {
        tracing::debug!(error = %err, "worker pipe close failed");
    }
    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            if unit.is_alive() {
                unit.terminate()?;
            }
            unit.join()?;
            return Err(err.into());
        }
    };

    unit.join()?;
    if let Some(Ok(status)) = unit.take_output() {
        if !status.success() {
            return Err(TaskError::Failed {
                error: format!("worker exited with {status}"),
            });
        }
    }
    if reply.id != task.id() {
        return Err(TaskError::Failed {
            error: format!("worker answered {} instead of {}", reply.id, task.id()),
        });
    }
    reply.outcome.map_err(|error| TaskError::Failed { error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_workload::{compute, TaskId};
    use std::io::Cursor;

    fn frames(requests: &[WorkRequest]) -> Cursor<Vec<u8>> {
        let mut encoder = StreamEndpoint::new(std::io::empty(), Vec::new());
        for request in requests {
            encoder.send(request).unwrap();
        }
        Cursor::new(encoder.into_writer().unwrap())
    }

    fn replies(bytes: Vec<u8>) -> Vec<WorkReply> {
        let mut decoder = StreamEndpoint::new(Cursor::new(bytes), std::io::sink());
        std::iter::from_fn(|| decoder.receive::<WorkReply>().ok()).collect()
    }

    #[test]
    fn serves_until_stop() {
        let input = frames(&[
            WorkRequest::Run(Task::new(1u64, 10)),
            WorkRequest::Run(Task::new(2u64, -3)),
            WorkRequest::Stop,
            WorkRequest::Run(Task::new(3u64, 10)),
        ]);
        let mut output = Vec::new();
        let mut endpoint = StreamEndpoint::new(input, &mut output);
        assert_eq!(serve_worker(&mut endpoint).unwrap(), 2);
        drop(endpoint);

        let replies = replies(output);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, TaskId::new(1));
        assert_eq!(replies[0].outcome, Ok(compute(10).unwrap()));
        assert!(replies[1].outcome.as_ref().unwrap_err().contains("-3"));
    }

    #[test]
    fn end_of_input_is_a_clean_stop() {
        let input = frames(&[WorkRequest::Run(Task::new(9u64, 3))]);
        let mut output = Vec::new();
        let mut endpoint = StreamEndpoint::new(input, &mut output);
        assert_eq!(serve_worker(&mut endpoint).unwrap(), 1);
        drop(endpoint);
        assert_eq!(replies(output)[0].outcome.as_ref().unwrap().largest_prime(), Some(2));
    }

    #[test]
    fn garbage_input_is_reported() {
        let mut endpoint = StreamEndpoint::new(Cursor::new("{not json}\n"), std::io::sink());
        assert!(matches!(
            serve_worker(&mut endpoint),
            Err(TaskError::Sync(SyncError::Codec(_)))
        ));
    }

    #[test]
    fn missing_worker_program_fails_to_spawn() {
        let err = run_in_process(Path::new("/nonexistent/coordinate"), Task::new(1u64, 5)).unwrap_err();
        assert!(matches!(err, TaskError::Spawn(_)));
    }
}
