//! Mutual exclusion with an explicit acquire/release pair.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::monitor::Monitor;
use crate::SyncError;

/// Who may release a held [`Lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// Only the acquiring thread may release; anyone else gets
    /// [`SyncError::NotOwned`].
    #[default]
    Tracked,
    /// Any thread may release a held lock, which makes the lock usable as a
    /// binary hand-off signal between threads.
    Agnostic,
}

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    holder: Option<ThreadId>,
}

/// A non-reentrant mutual exclusion lock.
///
/// At most one holder exists at any time. Acquiring again from the holding
/// thread blocks forever; use [`crate::ReentrantLock`] when nesting is needed.
///
/// ```
/// use foundation_sync::Lock;
///
/// let lock = Lock::new();
/// {
///     let _held = lock.guard();
///     assert!(lock.is_locked());
/// }
/// assert!(!lock.is_locked());
/// ```
#[derive(Debug, Default)]
pub struct Lock {
    monitor: Monitor<LockState>,
    ownership: Ownership,
}

impl Lock {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_ownership(Ownership::Tracked)
    }

    #[must_use]
    pub const fn with_ownership(ownership: Ownership) -> Self {
        Self {
            monitor: Monitor::new(LockState {
                locked: false,
                holder: None,
            }),
            ownership,
        }
    }

    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Blocks until the lock is free, then takes it.
    pub fn acquire(&self) {
        let guard = self.monitor.lock();
        let mut guard = self.monitor.wait_while(guard, |state| state.locked);
        guard.locked = true;
        guard.holder = Some(thread::current().id());
    }

    /// Takes the lock if it is free right now.
    pub fn try_acquire(&self) -> bool {
        let mut guard = self.monitor.lock();
        if guard.locked {
            return false;
        }
        guard.locked = true;
        guard.holder = Some(thread::current().id());
        true
    }

    /// Waits at most `timeout` for the lock.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] when the lock is still held once `timeout`
    /// elapses; the lock is left untouched.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), SyncError> {
        let guard = self.monitor.lock();
        let (mut guard, timed_out) =
            self.monitor
                .wait_while_for(guard, Some(timeout), |state| state.locked);
        if timed_out {
            return Err(SyncError::Timeout { timeout });
        }
        guard.locked = true;
        guard.holder = Some(thread::current().id());
        Ok(())
    }

    /// Releases the lock and wakes one waiter.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotOwned`] when the lock is not held, or, for
    /// [`Ownership::Tracked`] locks, when the caller is not the holder.
    pub fn release(&self) -> Result<(), SyncError> {
        let mut guard = self.monitor.lock();
        if !guard.locked {
            return Err(SyncError::NotOwned);
        }
        if self.ownership == Ownership::Tracked && guard.holder != Some(thread::current().id()) {
            tracing::debug!(holder = ?guard.holder, "lock released by non-holder");
            return Err(SyncError::NotOwned);
        }
        guard.locked = false;
        guard.holder = None;
        drop(guard);
        self.monitor.notify_one();
        Ok(())
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    ///
    /// The guard stays on the acquiring thread, so the release on drop
    /// always comes from the holder.
    pub fn guard(&self) -> LockGuard<'_> {
        self.acquire();
        LockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.monitor.lock().locked
    }

    /// Whether the calling thread is the one that acquired the lock.
    #[must_use]
    pub fn is_held_by_current(&self) -> bool {
        let guard = self.monitor.lock();
        guard.locked && guard.holder == Some(thread::current().id())
    }
}

/// Scoped hold on a [`Lock`].
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a Lock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            tracing::warn!(error = %err, "lock guard failed to release");
        }
    }
}
