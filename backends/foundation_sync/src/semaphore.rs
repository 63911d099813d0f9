//! Counting semaphore.

use std::time::Duration;

use crate::monitor::Monitor;
use crate::SyncError;

/// What a release at full capacity does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemaphoreMode {
    /// Reject the release with [`SyncError::SemaphoreOverflow`].
    #[default]
    Strict,
    /// Let the permit count grow past the initial capacity.
    Lenient,
}

/// Counting semaphore with `capacity` initial permits.
///
/// In [`SemaphoreMode::Strict`] the available count always stays within
/// `[0, capacity]`, so at most `capacity` holders overlap.
#[derive(Debug)]
pub struct Semaphore {
    monitor: Monitor<usize>,
    capacity: usize,
    mode: SemaphoreMode,
}

impl Semaphore {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self::with_mode(capacity, SemaphoreMode::Strict)
    }

    #[must_use]
    pub const fn with_mode(capacity: usize, mode: SemaphoreMode) -> Self {
        Self {
            monitor: Monitor::new(capacity),
            capacity,
            mode,
        }
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) {
        let guard = self.monitor.lock();
        let mut available = self.monitor.wait_while(guard, |available| *available == 0);
        *available -= 1;
    }

    pub fn try_acquire(&self) -> bool {
        let mut available = self.monitor.lock();
        if *available == 0 {
            return false;
        }
        *available -= 1;
        true
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] when no permit frees up within `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), SyncError> {
        let guard = self.monitor.lock();
        let (mut available, timed_out) =
            self.monitor
                .wait_while_for(guard, Some(timeout), |available| *available == 0);
        if timed_out {
            return Err(SyncError::Timeout { timeout });
        }
        *available -= 1;
        Ok(())
    }

    /// Returns a permit and wakes one waiter.
    ///
    /// # Errors
    ///
    /// [`SyncError::SemaphoreOverflow`] for a strict semaphore already holding
    /// all of its permits.
    pub fn release(&self) -> Result<(), SyncError> {
        let mut available = self.monitor.lock();
        if self.mode == SemaphoreMode::Strict && *available >= self.capacity {
            return Err(SyncError::SemaphoreOverflow {
                capacity: self.capacity,
            });
        }
        *available += 1;
        drop(available);
        self.monitor.notify_one();
        Ok(())
    }

    /// Acquires a permit held until the returned value is dropped.
    pub fn permit(&self) -> SemaphorePermit<'_> {
        self.acquire();
        SemaphorePermit { semaphore: self }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        *self.monitor.lock()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn mode(&self) -> SemaphoreMode {
        self.mode
    }
}

/// A permit taken through [`Semaphore::permit`].
#[must_use = "the permit is returned as soon as it is dropped"]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.semaphore.release() {
            tracing::warn!(error = %err, "semaphore permit could not be returned");
        }
    }
}
