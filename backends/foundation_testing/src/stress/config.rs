//! Stress test configuration.

use core::time::Duration;

/// Configuration for stress tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    /// Number of threads to spawn
    thread_count: usize,
    /// Number of iterations per thread
    iterations: usize,
    /// Optional maximum duration for the test
    duration: Option<Duration>,
    /// How long an operation should dwell inside the region under test
    hold: Duration,
}

impl StressConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - `thread_count`: 4
    /// - `iterations`: 1000
    /// - `duration`: None (no time limit)
    /// - `hold`: zero
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: 4,
            iterations: 1000,
            duration: None,
            hold: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    #[must_use]
    pub const fn iterations(mut self, count: usize) -> Self {
        self.iterations = count;
        self
    }

    /// Sets the maximum duration for the test.
    ///
    /// Threads stop early once it is reached.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Time an operation should spend holding the resource under test.
    ///
    /// Longer holds make overlapping holders more likely, which is what a
    /// bounded-concurrency check needs to be meaningful.
    #[must_use]
    pub const fn hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    #[must_use]
    pub const fn thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub const fn iteration_count(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub const fn time_limit(&self) -> Option<Duration> {
        self.duration
    }

    #[must_use]
    pub const fn hold_time(&self) -> Duration {
        self.hold
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}
