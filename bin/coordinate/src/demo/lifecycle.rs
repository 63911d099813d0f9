use std::time::Duration;

use foundation_sync::SyncError;
use foundation_tasks::{worker_command, Scope, TaskError, TaskSupervisor};
use foundation_workload::{compute, compute_until, Task, WorkRequest};

use super::DemoContext;

const KILL_PATIENCE: Duration = Duration::from_secs(2);
const HEAVY_FACTOR: i64 = 1_000;

/// Gives a worker process a heavy task, waits a bounded time, then
/// terminates it if it is still going.
pub fn kill(context: &DemoContext) -> Result<(), TaskError> {
    let program = context.worker_program()?;
    let mut unit = TaskSupervisor::piped_process("long-task", worker_command(&program));
    unit.start()?;
    tracing::info!(pid = ?unit.id(), "process started, performing heavy computation");

    let mut endpoint = unit
        .take_endpoint()
        .ok_or(TaskError::Sync(SyncError::ChannelClosed))?;
    endpoint.send(&WorkRequest::Run(Task::new(0u64, context.scaled(HEAVY_FACTOR))))?;
    endpoint.send(&WorkRequest::Stop)?;

    let outcome = unit.join_timeout(KILL_PATIENCE)?;
    if outcome.is_timed_out() && unit.is_alive() {
        tracing::warn!(patience = ?KILL_PATIENCE, "timeout reached, terminating the process");
        unit.terminate()?;
        unit.join()?;
    }
    drop(endpoint);

    tracing::info!(state = %unit.state(), alive = unit.is_alive(), "process ended");
    if let Some(Ok(status)) = unit.take_output() {
        tracing::info!(%status, "exit status");
    }
    Ok(())
}

/// A foreground unit is waited for; background units are given up on when
/// the scope closes.
pub fn daemon(context: &DemoContext) -> Result<(), TaskError> {
    let program = context.worker_program()?;
    let foreground_size = context.scaled(2);
    let heavy_size = context.scaled(HEAVY_FACTOR);

    let mut daemon_process =
        TaskSupervisor::piped_process("daemon-process", worker_command(&program)).background(true);
    daemon_process.start()?;
    let mut endpoint = daemon_process
        .take_endpoint()
        .ok_or(TaskError::Sync(SyncError::ChannelClosed))?;
    endpoint.send(&WorkRequest::Run(Task::new(1u64, heavy_size)))?;

    let mut scope = Scope::new();
    scope.spawn(daemon_process)?;
    scope.spawn(
        TaskSupervisor::thread("daemon-thread", move |cancel| {
            tracing::info!("[start] daemon thread");
            let result = compute_until(heavy_size, || cancel.is_cancelled())?;
            tracing::info!("[exit] daemon thread | {result}");
            Ok(result)
        })
        .background(true),
    )?;
    scope.spawn(TaskSupervisor::thread("foreground", move |_| {
        tracing::info!("[start] foreground thread");
        let result = compute(foreground_size)?;
        tracing::info!("[done] foreground thread | {result}");
        Ok(result)
    }))?;

    tracing::info!("main waits for foreground work only");
    let report = scope.exit();
    drop(endpoint);

    tracing::info!(joined = ?report.joined, abandoned = ?report.abandoned, "scope closed");
    for (name, err) in &report.failed {
        tracing::error!(unit = %name, error = %err, "foreground unit failed");
    }
    Ok(())
}
