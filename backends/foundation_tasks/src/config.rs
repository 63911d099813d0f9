//! Runtime knobs for the coordination toolkit.
//!
//! Worker counts come from `COORDINATE_WORKERS` when set and valid, and fall
//! back to what `std::thread::available_parallelism` reports.

use std::env;
use std::path::PathBuf;

use foundation_sync::SemaphoreMode;

use crate::PoolConfig;

/// Environment variable holding the desired worker count.
pub const WORKERS_ENV: &str = "COORDINATE_WORKERS";

/// Environment variable pointing at the binary that serves `worker` requests.
pub const WORKER_PROGRAM_ENV: &str = "COORDINATE_WORKER_BIN";

const FALLBACK_WORKERS: usize = 4;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationConfig {
    workers: usize,
    queue_capacity: Option<usize>,
    semaphore_mode: SemaphoreMode,
    channel_capacity: usize,
    worker_program: Option<PathBuf>,
}

impl CoordinationConfig {
    /// Fixed defaults, ignoring the environment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            workers: FALLBACK_WORKERS,
            queue_capacity: None,
            semaphore_mode: SemaphoreMode::Strict,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            worker_program: None,
        }
    }

    /// Defaults overridden by [`WORKERS_ENV`] and [`WORKER_PROGRAM_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new().workers(desired_workers());
        if let Some(program) = env::var_os(WORKER_PROGRAM_ENV) {
            tracing::debug!(?program, "worker program taken from {WORKER_PROGRAM_ENV}");
            config.worker_program = Some(PathBuf::from(program));
        }
        config
    }

    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn semaphore_mode(mut self, mode: SemaphoreMode) -> Self {
        self.semaphore_mode = mode;
        self
    }

    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn queue_limit(&self) -> Option<usize> {
        self.queue_capacity
    }

    #[must_use]
    pub const fn semaphore(&self) -> SemaphoreMode {
        self.semaphore_mode
    }

    #[must_use]
    pub const fn channel_limit(&self) -> usize {
        self.channel_capacity
    }

    #[must_use]
    pub fn program(&self) -> Option<&PathBuf> {
        self.worker_program.as_ref()
    }

    /// The pool settings implied by this configuration.
    #[must_use]
    pub fn pool(&self) -> PoolConfig {
        PoolConfig::new(self.workers).queue_capacity(self.queue_capacity)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Worker count requested through [`WORKERS_ENV`], else the machine's
/// available parallelism.
#[must_use]
pub fn desired_workers() -> usize {
    match env::var(WORKERS_ENV).ok().map(|raw| raw.trim().parse::<usize>()) {
        Some(Ok(workers)) if workers > 0 => {
            tracing::debug!(workers, "worker count taken from {WORKERS_ENV}");
            return workers;
        }
        Some(_) => tracing::warn!("ignoring invalid {WORKERS_ENV}, expected a positive integer"),
        None => {}
    }
    available_workers()
}

fn available_workers() -> usize {
    match std::thread::available_parallelism() {
        Ok(count) => {
            tracing::debug!("thread::available_parallelism() reported: {count}");
            count.get()
        }
        Err(err) => {
            tracing::debug!(error = %err, "available_parallelism unavailable, using {FALLBACK_WORKERS}");
            FALLBACK_WORKERS
        }
    }
}
