use std::path::Path;
use std::time::Instant;

use foundation_sync::SyncError;
use foundation_tasks::{worker_command, ProcessEndpoint, ProcessUnit, TaskError, TaskSupervisor};
use foundation_workload::{compute, Task, WorkReply, WorkRequest, WorkResult};

use super::DemoContext;

const COMPARE_UNITS: u64 = 10;
const SPAWNED_WORKERS: u64 = 3;

type PipedWorker = (TaskSupervisor<ProcessUnit>, ProcessEndpoint);

/// The same batch of tasks run once as worker processes and once as
/// threads, timing each pass.
pub fn compare(context: &DemoContext) -> Result<(), TaskError> {
    let program = context.worker_program()?;
    let size = context.size;

    let started = Instant::now();
    let workers = (0..COMPARE_UNITS)
        .map(|id| launch(&program, "compare-process", Task::new(id, size)))
        .collect::<Result<Vec<_>, _>>()?;
    for worker in workers {
        collect(worker)?;
    }
    tracing::info!("list processing complete");
    let processes = started.elapsed();
    tracing::info!(elapsed = ?processes, units = COMPARE_UNITS, "multiprocessing time");

    let started = Instant::now();
    let mut threads = Vec::new();
    for id in 0..COMPARE_UNITS {
        let mut unit = TaskSupervisor::thread(format!("compare-thread-{id}"), move |_| {
            Ok(compute(size)?)
        });
        unit.start()?;
        threads.push(unit);
    }
    for unit in &mut threads {
        unit.join()?;
        if let Some(outcome) = unit.take_output() {
            outcome?;
        }
    }
    tracing::info!("list processing complete");
    let elapsed = started.elapsed();
    tracing::info!(elapsed = ?elapsed, units = COMPARE_UNITS, "multithreading time");

    tracing::info!(?processes, threads = ?elapsed, "isolation comparison");
    Ok(())
}

/// Starts a few fresh worker processes together and waits for all of them.
pub fn spawn(context: &DemoContext) -> Result<(), TaskError> {
    let program = context.worker_program()?;

    let mut workers = Vec::new();
    for id in 0..SPAWNED_WORKERS {
        let worker = launch(&program, "spawned", Task::new(id, context.size))?;
        tracing::info!(worker = id, pid = ?worker.0.id(), "[spawn] worker started");
        workers.push(worker);
    }

    for (id, worker) in (0..SPAWNED_WORKERS).zip(workers) {
        let result = collect(worker)?;
        tracing::info!(worker = id, "[done] {result}");
    }
    tracing::info!("all spawned processes completed");
    Ok(())
}

/// Starts a worker process and queues `task` plus a stop request on its pipe.
fn launch(program: &Path, prefix: &str, task: Task) -> Result<PipedWorker, TaskError> {
    let mut unit = TaskSupervisor::piped_process(format!("{prefix}-{}", task.id()), worker_command(program));
    unit.start()?;
    let mut endpoint = unit
        .take_endpoint()
        .ok_or(TaskError::Sync(SyncError::ChannelClosed))?;
    endpoint.send(&WorkRequest::Run(task))?;
    endpoint.send(&WorkRequest::Stop)?;
    Ok((unit, endpoint))
}

/// Reads the single reply of a launched worker and reaps it.
fn collect((mut unit, mut endpoint): PipedWorker) -> Result<WorkResult, TaskError> {
    let reply = endpoint.receive::<WorkReply>();
    if let Err(err) = endpoint.close() {
        tracing::debug!(error = %err, "worker pipe close failed");
    }
    unit.join()?;
    reply?.outcome.map_err(|error| TaskError::Failed { error })
}
