//! Fixed-size pool of worker threads fed by one shared queue.

use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use foundation_sync::{BoundedQueue, Condition, Envelope};

use crate::errors::panic_message;
use crate::TaskError;

type Job = Box<dyn FnOnce() + Send>;
type Slot<R> = Arc<Condition<Option<Result<R, TaskError>>>>;

/// Pool size and queue settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    workers: usize,
    queue_capacity: Option<usize>,
    name: String,
}

impl PoolConfig {
    #[must_use]
    pub const fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: None,
            name: String::new(),
        }
    }

    /// Bounds the job queue; `submit` blocks while it is full.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Prefix for worker thread names.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.workers
    }

    fn thread_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("pool-worker-{index}")
        } else {
            format!("{}-{index}", self.name)
        }
    }
}

/// The pending result of one submitted job.
#[must_use = "dropping a handle discards the job's result"]
pub struct TaskHandle<R> {
    slot: Slot<R>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the job has run and returns its outcome.
    ///
    /// # Errors
    ///
    /// [`TaskError::Failed`] or [`TaskError::Panicked`] from the job.
    pub fn wait(self) -> Result<R, TaskError> {
        let mut slot = self.slot.lock().wait_while(|value| value.is_none());
        slot.take().unwrap_or(Err(TaskError::PoolShutdown))
    }

    /// Waits at most `timeout`; hands the handle back if the job is not done.
    ///
    /// # Errors
    ///
    /// Returns `self` when the job has not finished within `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<R, TaskError>, Self> {
        let (mut slot, waited) = self
            .slot
            .lock()
            .wait_while_timeout(timeout, |value| value.is_none());
        if waited.timed_out() {
            drop(slot);
            return Err(self);
        }
        Ok(slot.take().unwrap_or(Err(TaskError::PoolShutdown)))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.lock().is_some()
    }
}

struct PoolState {
    accepting: bool,
    threads: Vec<JoinHandle<()>>,
}

/// `k` worker threads pulling jobs from one FIFO.
///
/// A job's failure or panic lands in its own [`TaskHandle`]; workers and
/// sibling jobs carry on. [`WorkerPool::shutdown`] (also run on drop) stops
/// intake, lets queued jobs finish, then joins every worker.
///
/// ```
/// use foundation_tasks::{PoolConfig, WorkerPool};
/// use foundation_workload::compute;
///
/// let pool = WorkerPool::new(PoolConfig::new(3)).unwrap();
/// let results = pool.map([1, 2, 3, 4, 5], compute).unwrap();
/// assert_eq!(results.len(), 5);
/// assert!(results.iter().all(Result::is_ok));
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    queue: BoundedQueue<Envelope<Job>>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    /// Starts `config.worker_count()` worker threads.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidArgument`] for zero workers or a zero queue
    /// capacity; [`TaskError::Spawn`] if a worker thread cannot be created.
    pub fn new(config: PoolConfig) -> Result<Self, TaskError> {
        if config.workers == 0 {
            return Err(TaskError::InvalidArgument(
                "worker pool needs at least one worker".to_owned(),
            ));
        }
        let queue = match config.queue_capacity {
            Some(0) => {
                return Err(TaskError::InvalidArgument(
                    "worker pool queue capacity must be > 0".to_owned(),
                ))
            }
            Some(capacity) => BoundedQueue::bounded(capacity),
            None => BoundedQueue::unbounded(),
        };

        let pool = Self {
            queue,
            state: Mutex::new(PoolState {
                accepting: true,
                threads: Vec::with_capacity(config.workers),
            }),
            config,
        };

        for index in 0..pool.config.workers {
            let queue = pool.queue.clone();
            let spawned = thread::Builder::new()
                .name(pool.config.thread_name(index))
                .spawn(move || worker_loop(index, &queue));
            match spawned {
                Ok(handle) => pool.lock_state().threads.push(handle),
                // Dropping `pool` stops the workers already running.
                Err(err) => return Err(TaskError::Spawn(err)),
            }
        }

        tracing::info!(workers = pool.config.workers, "worker pool started");
        Ok(pool)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `job` and returns a handle to its outcome.
    ///
    /// An `Err` from the job becomes [`TaskError::Failed`] with the error's
    /// display text.
    ///
    /// # Errors
    ///
    /// [`TaskError::PoolShutdown`] once shutdown has begun.
    pub fn submit<F, R, E>(&self, job: F) -> Result<TaskHandle<R>, TaskError>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: Display,
    {
        let slot: Slot<R> = Arc::new(Condition::new(None));
        let fulfil = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed {
                    error: err.to_string(),
                }),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(%message, "pool job panicked");
                    Err(TaskError::Panicked { message })
                }
            };
            let mut slot = fulfil.lock();
            *slot = Some(outcome);
            slot.notify_all();
        });

        // Held across the put so no job can land behind the stop markers.
        let state = self.lock_state();
        if !state.accepting {
            return Err(TaskError::PoolShutdown);
        }
        self.queue.put_item(job);
        drop(state);

        Ok(TaskHandle { slot })
    }

    /// Runs `job` over every input and returns the outcomes in input order,
    /// whatever order they complete in.
    ///
    /// # Errors
    ///
    /// [`TaskError::PoolShutdown`] if the pool stops accepting work before
    /// every input is queued. Per-input failures are in the returned vector.
    pub fn map<I, T, F, R, E>(&self, inputs: I, job: F) -> Result<Vec<Result<R, TaskError>>, TaskError>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
        R: Send + 'static,
        E: Display,
    {
        let job = Arc::new(job);
        let handles = inputs
            .into_iter()
            .map(|input| {
                let job = Arc::clone(&job);
                self.submit(move || job(input))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(handles.into_iter().map(TaskHandle::wait).collect())
    }

    /// Stops accepting jobs, lets queued ones finish, then joins the workers.
    /// Idempotent.
    pub fn shutdown(&self) {
        let threads = {
            let mut state = self.lock_state();
            if !state.accepting {
                return;
            }
            state.accepting = false;
            self.queue.put_stop(state.threads.len());
            std::mem::take(&mut state.threads)
        };

        tracing::debug!(workers = threads.len(), "worker pool draining");
        for handle in threads {
            if handle.join().is_err() {
                tracing::error!("pool worker exited by panic");
            }
        }
        tracing::info!("worker pool shut down");
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        !self.lock_state().accepting
    }

    /// Jobs queued and not yet picked up by a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, queue: &BoundedQueue<Envelope<Job>>) {
    match queue.drain_until_stop(|job| job()) {
        Ok(handled) => tracing::debug!(worker = index, handled, "pool worker stopping"),
        Err(err) => tracing::error!(worker = index, error = %err, "pool worker lost track of its queue"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_workload::{compute, WorkloadError};
    use ntest::timeout;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    #[timeout(20000)]
    fn map_preserves_input_order_despite_delays() {
        let pool = WorkerPool::new(PoolConfig::new(3)).unwrap();
        let results = pool
            .map([1u64, 2, 3, 4, 5], |n| {
                thread::sleep(Duration::from_millis((6 - n) * 15));
                Ok::<_, WorkloadError>(n * 10)
            })
            .unwrap();
        let values: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    #[timeout(20000)]
    fn failures_are_isolated_per_job() {
        let pool = WorkerPool::new(PoolConfig::new(2)).unwrap();
        let results = pool.map([5i64, -1, 10], compute).unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(&results[1], Err(TaskError::Failed { error }) if error.contains("-1")));
        assert_eq!(results[2].as_ref().unwrap().largest_prime(), Some(7));
    }

    #[test]
    #[timeout(20000)]
    fn panics_are_caught_and_workers_survive() {
        let pool = WorkerPool::new(PoolConfig::new(1)).unwrap();
        let panicked = pool
            .submit(|| -> Result<(), String> { panic!("job exploded") })
            .unwrap();
        let healthy = pool.submit(|| Ok::<_, String>(7)).unwrap();

        assert!(matches!(
            panicked.wait(),
            Err(TaskError::Panicked { message }) if message == "job exploded"
        ));
        assert_eq!(healthy.wait().unwrap(), 7);
    }

    #[test]
    #[timeout(20000)]
    fn shutdown_drains_queued_jobs_then_refuses_new_ones() {
        let pool = WorkerPool::new(PoolConfig::new(2).queue_capacity(Some(16))).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let ran = Arc::clone(&ran);
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(2));
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                })
                .unwrap()
            })
            .collect();

        pool.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
        assert!(handles.iter().all(TaskHandle::is_ready));
        assert!(pool.is_shutdown());
        assert!(matches!(
            pool.submit(|| Ok::<_, String>(())),
            Err(TaskError::PoolShutdown)
        ));
        pool.shutdown();
    }

    #[test]
    #[timeout(20000)]
    fn wait_timeout_hands_back_the_handle() {
        let pool = WorkerPool::new(PoolConfig::new(1).name("slow")).unwrap();
        let handle = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(50));
                Ok::<_, String>("done")
            })
            .unwrap();
        let handle = match handle.wait_timeout(Duration::from_millis(1)) {
            Err(handle) => handle,
            Ok(_) => panic!("job finished implausibly fast"),
        };
        assert_eq!(handle.wait().unwrap(), "done");
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            WorkerPool::new(PoolConfig::new(0)),
            Err(TaskError::InvalidArgument(_))
        ));
        assert!(matches!(
            WorkerPool::new(PoolConfig::new(1).queue_capacity(Some(0))),
            Err(TaskError::InvalidArgument(_))
        ));
    }
}
