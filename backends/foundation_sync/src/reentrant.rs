//! A lock the holding thread may take again.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::monitor::Monitor;
use crate::SyncError;

#[derive(Debug, Default)]
struct ReentrantState {
    owner: Option<ThreadId>,
    count: usize,
}

/// Re-entrant mutual exclusion.
///
/// The owner may acquire again without blocking; every acquire must be
/// matched by a release, and the lock becomes available to others only when
/// the count returns to zero.
#[derive(Debug, Default)]
pub struct ReentrantLock {
    monitor: Monitor<ReentrantState>,
}

impl ReentrantLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            monitor: Monitor::new(ReentrantState {
                owner: None,
                count: 0,
            }),
        }
    }

    pub fn acquire(&self) {
        let me = thread::current().id();
        let mut guard = self.monitor.lock();
        if guard.owner == Some(me) {
            guard.count += 1;
            return;
        }
        let mut guard = self.monitor.wait_while(guard, |state| state.owner.is_some());
        guard.owner = Some(me);
        guard.count = 1;
    }

    pub fn try_acquire(&self) -> bool {
        let me = thread::current().id();
        let mut guard = self.monitor.lock();
        match guard.owner {
            Some(owner) if owner == me => guard.count += 1,
            Some(_) => return false,
            None => {
                guard.owner = Some(me);
                guard.count = 1;
            }
        }
        true
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if another thread still owns the lock when
    /// `timeout` elapses.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), SyncError> {
        let me = thread::current().id();
        let mut guard = self.monitor.lock();
        if guard.owner == Some(me) {
            guard.count += 1;
            return Ok(());
        }
        let (mut guard, timed_out) =
            self.monitor
                .wait_while_for(guard, Some(timeout), |state| state.owner.is_some());
        if timed_out {
            return Err(SyncError::Timeout { timeout });
        }
        guard.owner = Some(me);
        guard.count = 1;
        Ok(())
    }

    /// Drops one level of ownership.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotOwned`] when the calling thread is not the owner.
    pub fn release(&self) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        if guard.owner != Some(thread::current().id()) {
            return Err(SyncError::NotOwned);
        }
        guard.count -= 1;
        if guard.count > 0 {
            return Ok(());
        }
        guard.owner = None;
        drop(guard);
        self.monitor.notify_one();
        Ok(())
    }

    pub fn guard(&self) -> ReentrantGuard<'_> {
        self.acquire();
        ReentrantGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// How many times the calling thread currently holds the lock.
    #[must_use]
    pub fn hold_count(&self) -> usize {
        let guard = self.monitor.lock();
        if guard.owner == Some(thread::current().id()) {
            guard.count
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_held_by_current(&self) -> bool {
        self.hold_count() > 0
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.monitor.lock().owner.is_some()
    }
}

#[must_use = "one level of the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            tracing::warn!(error = %err, "reentrant guard failed to release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn nested(lock: &ReentrantLock, depth: usize, seen: &mut Vec<usize>) {
        let _held = lock.guard();
        seen.push(lock.hold_count());
        if depth > 1 {
            nested(lock, depth - 1, seen);
        }
    }

    #[test]
    fn owner_can_nest_and_count_unwinds() {
        let lock = ReentrantLock::new();
        let mut seen = Vec::new();
        nested(&lock, 3, &mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(lock.hold_count(), 0);
        assert!(!lock.is_locked());
    }

    #[test]
    fn other_threads_wait_for_full_release() {
        let lock = Arc::new(ReentrantLock::new());
        lock.acquire();
        lock.acquire();
        lock.release().unwrap();

        let clone = Arc::clone(&lock);
        let blocked = thread::spawn(move || clone.try_acquire()).join().unwrap();
        assert!(!blocked);

        lock.release().unwrap();
        let clone = Arc::clone(&lock);
        let acquired = thread::spawn(move || {
            let acquired = clone.try_acquire();
            clone.release().unwrap();
            acquired
        })
        .join()
        .unwrap();
        assert!(acquired);
    }

    #[test]
    fn release_by_non_owner_fails() {
        let lock = Arc::new(ReentrantLock::new());
        assert!(matches!(lock.release(), Err(SyncError::NotOwned)));
        lock.acquire();
        let clone = Arc::clone(&lock);
        let result = thread::spawn(move || clone.release()).join().unwrap();
        assert!(matches!(result, Err(SyncError::NotOwned)));
        lock.release().unwrap();
    }

    #[test]
    fn acquire_timeout_reenters_immediately() {
        let lock = ReentrantLock::new();
        lock.acquire();
        lock.acquire_timeout(Duration::from_millis(1)).unwrap();
        assert_eq!(lock.hold_count(), 2);
        lock.release().unwrap();
        lock.release().unwrap();
    }
}
