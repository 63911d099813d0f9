//! Stress test framework for the coordination primitives.
//!
//! Threads are scoped, so operations may borrow the primitive under test
//! directly instead of cloning `Arc`s into every closure.

use core::time::Duration;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

pub mod config;

pub use config::StressConfig;

/// Result of a stress test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressResult {
    /// Operations that returned `true`
    pub successes: usize,
    /// Operations that returned `false`
    pub failures: usize,
    /// Operations that panicked
    pub panics: usize,
    /// Wall time of the whole run
    pub duration: Duration,
    /// Number of threads used
    pub thread_count: usize,
}

impl StressResult {
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures + self.panics
    }

    /// Successes over all operations, between 0.0 and 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures == 0 && self.panics == 0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / secs
        }
    }
}

/// Runs one operation from many threads at once.
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs `operation(thread_id, iteration)` on every thread until the
    /// iteration count or the time limit is reached.
    ///
    /// A panicking operation is counted in [`StressResult::panics`] and its
    /// thread carries on with the next iteration.
    ///
    /// ```
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let counter = AtomicUsize::new(0);
    /// let config = StressConfig::new().threads(4).iterations(100);
    ///
    /// let result = StressHarness::new(config).run(|_thread_id, _iteration| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    ///     true
    /// });
    ///
    /// assert_eq!(counter.load(Ordering::Relaxed), 400);
    /// assert!(result.is_clean());
    /// ```
    pub fn run<F>(&self, operation: F) -> StressResult
    where
        F: Fn(usize, usize) -> bool + Sync,
    {
        let start = Instant::now();
        let deadline = self.config.time_limit().map(|limit| start + limit);
        let successes = AtomicUsize::new(0);
        let failures = AtomicUsize::new(0);
        let panics = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);

        thread::scope(|scope| {
            for thread_id in 0..self.config.thread_count() {
                let (operation, successes, failures, panics, stop) =
                    (&operation, &successes, &failures, &panics, &stop);
                let iterations = self.config.iteration_count();

                scope.spawn(move || {
                    for iteration in 0..iterations {
                        if stop.load(Ordering::Acquire) {
                            break;
                        }
                        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                            stop.store(true, Ordering::Release);
                            break;
                        }

                        match catch_unwind(AssertUnwindSafe(|| operation(thread_id, iteration))) {
                            Ok(true) => successes.fetch_add(1, Ordering::Relaxed),
                            Ok(false) => failures.fetch_add(1, Ordering::Relaxed),
                            Err(_) => panics.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                });
            }
        });

        let result = StressResult {
            successes: successes.into_inner(),
            failures: failures.into_inner(),
            panics: panics.into_inner(),
            duration: start.elapsed(),
            thread_count: self.config.thread_count(),
        };
        tracing::debug!(?result, "stress run finished");
        result
    }

    #[must_use]
    pub const fn config(&self) -> &StressConfig {
        &self.config
    }
}
