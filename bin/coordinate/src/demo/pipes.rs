use std::thread;
use std::time::Instant;

use foundation_sync::{duplex, BoundedQueue, Endpoint, Envelope, ResultAggregator};
use foundation_tasks::{run_in_process, TaskError, WorkerPool};
use foundation_workload::{compute, Task, WorkReply, WorkRequest, WorkResult};

use super::locks::{join_all, log_summary};
use super::{DemoContext, Isolation};

const QUEUE_CONSUMERS: usize = 3;
const QUEUE_TASKS: u64 = 6;
const POOL_COUNTS: [i64; 5] = [1, 2, 3, 4, 5];

/// One producer, three consumers, one stop marker per consumer, and a join
/// on the queue before the summary.
pub fn queue(context: &DemoContext) -> Result<(), TaskError> {
    let queue: BoundedQueue<Envelope<Task>> = match context.config.queue_limit() {
        Some(capacity) if capacity > 0 => BoundedQueue::bounded(capacity),
        _ => BoundedQueue::unbounded(),
    };
    let results = ResultAggregator::new();
    let size = context.scaled(2);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..QUEUE_CONSUMERS)
            .map(|consumer| {
                let queue = &queue;
                let results = &results;
                scope.spawn(move || -> Result<(), TaskError> {
                    let handled = queue.drain_until_stop(|task: Task| {
                        let began = Instant::now();
                        match context.run_task(task) {
                            Ok(result) => {
                                tracing::info!(
                                    consumer,
                                    task = %task.id(),
                                    elapsed = ?began.elapsed(),
                                    "[queue] processed | {result}"
                                );
                                results.push(task.id(), result);
                            }
                            Err(err) => {
                                tracing::error!(consumer, task = %task.id(), error = %err, "[queue] task failed");
                            }
                        }
                    })?;
                    tracing::info!(consumer, handled, "[queue] received stop signal");
                    Ok(())
                })
            })
            .collect();

        let queue = &queue;
        let producer = scope.spawn(move || {
            for id in 0..QUEUE_TASKS {
                tracing::info!(task = id, "[queue] producer enqueuing");
                queue.put_item(Task::new(id, size));
            }
            queue.put_stop(QUEUE_CONSUMERS);
        });
        if producer.join().is_err() {
            return Err(TaskError::Panicked {
                message: "queue producer panicked".into(),
            });
        }

        queue.join();
        tracing::info!("all queue tasks processed");
        join_all(handles)
    })?;

    log_summary("queue", &results);
    Ok(())
}

/// Sends one task down a pipe and reads the reply back: to a serving
/// thread over an in-process duplex channel, or to a worker process.
pub fn pipe(context: &DemoContext) -> Result<(), TaskError> {
    let task = Task::new(0u64, context.scaled(3));
    let result = match context.isolation {
        Isolation::Thread => pipe_to_thread(context, task)?,
        Isolation::Process => {
            let program = context.worker_program()?;
            tracing::info!(program = %program.display(), "waiting for result from pipe");
            run_in_process(&program, task)?
        }
    };
    tracing::info!("[pipe] result received | {result}");
    Ok(())
}

fn pipe_to_thread(context: &DemoContext, task: Task) -> Result<WorkResult, TaskError> {
    let capacity = context.config.channel_limit();
    let (mut parent, child) = duplex::<WorkRequest, WorkReply>(capacity);

    thread::scope(|scope| -> Result<WorkResult, TaskError> {
        let server = scope.spawn(move || serve_requests(&child));
        tracing::info!(capacity, "waiting for result from pipe");

        parent.send(WorkRequest::Run(task))?;
        parent.send(WorkRequest::Stop)?;
        let reply = parent.receive()?;
        parent.close();

        match server.join() {
            Ok(served) => tracing::debug!(served, "pipe server finished"),
            Err(_) => {
                return Err(TaskError::Panicked {
                    message: "pipe server panicked".into(),
                })
            }
        }
        if reply.id != task.id() {
            return Err(TaskError::Failed {
                error: format!("pipe answered {} instead of {}", reply.id, task.id()),
            });
        }
        reply.outcome.map_err(|error| TaskError::Failed { error })
    })
}

fn serve_requests(endpoint: &Endpoint<WorkReply, WorkRequest>) -> usize {
    let mut served = 0;
    while let Ok(WorkRequest::Run(task)) = endpoint.receive() {
        let reply = WorkReply::from_outcome(task.id(), task.run());
        if endpoint.send(reply).is_err() {
            break;
        }
        served += 1;
    }
    served
}

/// Maps five task sizes over a fixed pool; results come back in input order.
/// With process isolation each pool thread hands its task to a worker
/// process.
pub fn pool(context: &DemoContext) -> Result<(), TaskError> {
    let pool = WorkerPool::new(context.config.pool().name("demo-pool"))?;
    let base = context.size;

    let outcomes = match context.isolation {
        Isolation::Thread => pool.map(POOL_COUNTS, move |count| compute(base.saturating_mul(count)))?,
        Isolation::Process => {
            let program = context.worker_program()?;
            pool.map(POOL_COUNTS.into_iter().zip(0u64..), move |(count, id)| {
                run_in_process(&program, Task::new(id, base.saturating_mul(count)))
            })?
        }
    };
    pool.shutdown();

    tracing::info!(workers = pool.workers(), "=== pool results ===");
    for (count, outcome) in POOL_COUNTS.iter().zip(outcomes) {
        match outcome {
            Ok(result) => tracing::info!("task count={count} -> {result}"),
            Err(err) => tracing::error!(count, error = %err, "pool task failed"),
        }
    }
    Ok(())
}
