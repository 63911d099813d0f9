use std::thread;
use std::time::Instant;

use foundation_sync::{Lock, ReentrantLock, ResultAggregator};
use foundation_tasks::TaskError;
use foundation_workload::{compute, WorkResult};

use super::DemoContext;

const LOCK_WORKERS: usize = 5;
const RLOCK_WORKERS: usize = 4;
const RLOCK_DEPTH: usize = 2;

/// Workers compute in parallel and take the lock only to publish.
pub fn lock(context: &DemoContext) -> Result<(), TaskError> {
    let lock = Lock::new();
    let results = ResultAggregator::new();
    let size = context.scaled(3);
    let started = Instant::now();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..LOCK_WORKERS)
            .map(|id| {
                let lock = &lock;
                let results = &results;
                scope.spawn(move || -> Result<(), TaskError> {
                    let began = Instant::now();
                    let result = compute(size)?;
                    let elapsed = began.elapsed();

                    let _held = lock.guard();
                    results.push(id, result);
                    tracing::info!(worker = id, ?elapsed, "[lock] appended result | {result}");
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    })?;

    tracing::info!(elapsed = ?started.elapsed(), "all lock workers done");
    log_summary("lock", &results);
    Ok(())
}

/// Each worker re-enters the same lock before computing at the innermost
/// level.
pub fn rlock(context: &DemoContext) -> Result<(), TaskError> {
    let lock = ReentrantLock::new();
    let results = ResultAggregator::new();
    let size = context.scaled(2);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..RLOCK_WORKERS)
            .map(|id| {
                let lock = &lock;
                let results = &results;
                scope.spawn(move || nested(lock, results, id, size, RLOCK_DEPTH))
            })
            .collect();
        join_all(handles)
    })?;

    log_summary("rlock", &results);
    Ok(())
}

fn nested(
    lock: &ReentrantLock,
    results: &ResultAggregator<usize, WorkResult>,
    id: usize,
    size: i64,
    depth: usize,
) -> Result<(), TaskError> {
    let _held = lock.guard();
    if depth > 0 {
        return nested(lock, results, id, size, depth - 1);
    }
    let began = Instant::now();
    let result = compute(size)?;
    tracing::info!(
        worker = id,
        hold_count = lock.hold_count(),
        elapsed = ?began.elapsed(),
        "[rlock] completed | {result}"
    );
    results.push(id, result);
    Ok(())
}

/// Joins scoped worker threads, surfacing the first failure.
pub(super) fn join_all<'scope>(
    handles: Vec<thread::ScopedJoinHandle<'scope, Result<(), TaskError>>>,
) -> Result<(), TaskError> {
    let mut first_error = None;
    for handle in handles {
        let outcome = handle.join().unwrap_or_else(|_| {
            Err(TaskError::Panicked {
                message: "demo worker panicked".into(),
            })
        });
        if let Err(err) = outcome {
            tracing::error!(error = %err, "demo worker failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub(super) fn log_summary<K>(demo: &str, results: &ResultAggregator<K, WorkResult>)
where
    K: Clone + std::fmt::Display,
{
    tracing::info!(demo, total = results.len(), "results summary");
    for (key, result) in results.snapshot() {
        tracing::info!(demo, "  {key} -> {result}");
    }
}
