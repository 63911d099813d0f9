use std::thread;
use std::time::{Duration, Instant};

use foundation_sync::{Barrier, Condition, Event, ResultAggregator, Semaphore};
use foundation_tasks::TaskError;
use foundation_workload::{compute, WorkResult};

use super::locks::{join_all, log_summary};
use super::DemoContext;

const SEMAPHORE_PERMITS: usize = 2;
const SEMAPHORE_WORKERS: usize = 6;
const BARRIER_PARTIES: usize = 5;
const CONDITION_TARGET: usize = 4;
const CONDITION_PATIENCE: Duration = Duration::from_secs(5);
const CONDITION_STAGGER: Duration = Duration::from_millis(500);
const EVENT_WORKERS: usize = 5;
const EVENT_SETUP_DELAY: Duration = Duration::from_secs(2);

/// Six workers share two permits.
pub fn semaphore(context: &DemoContext) -> Result<(), TaskError> {
    let semaphore = Semaphore::with_mode(SEMAPHORE_PERMITS, context.config.semaphore());
    let results = ResultAggregator::new();
    let size = context.scaled(2);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..SEMAPHORE_WORKERS)
            .map(|id| {
                let semaphore = &semaphore;
                let results = &results;
                scope.spawn(move || -> Result<(), TaskError> {
                    tracing::info!(worker = id, "[semaphore] waiting for a permit");
                    let _permit = semaphore.permit();
                    tracing::info!(worker = id, available = semaphore.available(), "[semaphore] start");
                    let began = Instant::now();
                    let result = compute(size)?;
                    tracing::info!(worker = id, elapsed = ?began.elapsed(), "[semaphore] done | {result}");
                    results.push(id, result);
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    })?;

    log_summary("semaphore", &results);
    Ok(())
}

/// Nobody computes until all five parties have arrived.
pub fn barrier(context: &DemoContext) -> Result<(), TaskError> {
    let barrier = Barrier::new(BARRIER_PARTIES);
    let size = context.scaled(5);
    let started = Instant::now();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..BARRIER_PARTIES)
            .map(|id| {
                let barrier = &barrier;
                scope.spawn(move || -> Result<(), TaskError> {
                    tracing::info!(worker = id, "[barrier] reached barrier");
                    let arrival = barrier.wait()?;
                    if arrival.is_leader() {
                        tracing::info!(generation = arrival.generation(), "[barrier] released");
                    }
                    let began = Instant::now();
                    let result = compute(size)?;
                    tracing::info!(worker = id, elapsed = ?began.elapsed(), "[barrier] done | {result}");
                    Ok(())
                })
            })
            .collect();
        join_all(handles)
    })?;

    tracing::info!(elapsed = ?started.elapsed(), "total barrier execution time");
    Ok(())
}

/// A controller sleeps on a condition until four workers have appended.
pub fn condition(context: &DemoContext) -> Result<(), TaskError> {
    let shared: Condition<Vec<(usize, WorkResult)>> = Condition::new(Vec::new());
    let size = context.scaled(2);

    thread::scope(|scope| {
        let shared = &shared;
        let controller = scope.spawn(move || -> Result<(), TaskError> {
            let mut results = shared.lock();
            while results.len() < CONDITION_TARGET {
                tracing::info!(have = results.len(), target = CONDITION_TARGET, "[condition] controller waiting");
                let (guard, waited) = results.wait_timeout(CONDITION_PATIENCE);
                results = guard;
                if waited.timed_out() {
                    tracing::debug!("[condition] controller woke on timeout");
                }
            }
            tracing::info!("[condition] target reached, processing results");
            for (id, result) in results.iter() {
                tracing::info!("  worker {id} -> {result}");
            }
            Ok(())
        });

        let mut handles = Vec::with_capacity(CONDITION_TARGET + 1);
        for id in 0..CONDITION_TARGET {
            handles.push(scope.spawn(move || -> Result<(), TaskError> {
                let result = compute(size)?;
                let mut results = shared.lock();
                results.push((id, result));
                tracing::info!(worker = id, "[condition] appended result ({}/{CONDITION_TARGET})", results.len());
                results.notify_all();
                Ok(())
            }));
            thread::sleep(CONDITION_STAGGER);
        }
        handles.push(controller);
        join_all(handles)
    })?;

    Ok(())
}

/// Workers block on an event the main thread sets after its setup.
pub fn event(context: &DemoContext) -> Result<(), TaskError> {
    let start = Event::new();
    let results = ResultAggregator::new();
    let size = context.scaled(3);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..EVENT_WORKERS)
            .map(|id| {
                let start = &start;
                let results = &results;
                scope.spawn(move || -> Result<(), TaskError> {
                    tracing::info!(worker = id, "[event] waiting for start event");
                    start.wait();
                    let began = Instant::now();
                    let result = compute(size)?;
                    tracing::info!(worker = id, elapsed = ?began.elapsed(), "[event] finished | {result}");
                    results.push(id, result);
                    Ok(())
                })
            })
            .collect();

        tracing::info!(delay = ?EVENT_SETUP_DELAY, "main thread simulating setup before setting the event");
        thread::sleep(EVENT_SETUP_DELAY);
        start.set();
        join_all(handles)
    })?;

    log_summary("event", &results);
    Ok(())
}
