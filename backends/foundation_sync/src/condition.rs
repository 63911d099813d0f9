//! A condition variable bundled with the state it guards.

use std::ops::{Deref, DerefMut};
use std::sync::MutexGuard;
use std::time::Duration;

use crate::monitor::Monitor;

/// Whether a timed condition wait returned because its timeout elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.0
    }
}

/// State of type `T` that threads wait on and notify about.
///
/// Waiting requires holding the guard; the wait releases the lock while
/// blocked and re-acquires it before returning. Predicate-based waits
/// (`wait_while*`) absorb spurious wakeups and should be preferred.
///
/// ```
/// use foundation_sync::Condition;
/// use std::sync::Arc;
/// use std::thread;
///
/// let ready = Arc::new(Condition::new(false));
/// let setter = Arc::clone(&ready);
/// thread::spawn(move || {
///     *setter.lock() = true;
///     setter.notify_all();
/// });
///
/// let guard = ready.lock().wait_while(|ready| !*ready);
/// assert!(*guard);
/// ```
#[derive(Debug, Default)]
pub struct Condition<T> {
    monitor: Monitor<T>,
}

impl<T> Condition<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            monitor: Monitor::new(value),
        }
    }

    pub fn lock(&self) -> ConditionGuard<'_, T> {
        ConditionGuard {
            condition: self,
            guard: self.monitor.lock(),
        }
    }

    /// Wakes one waiter. Calling without holding the guard is allowed.
    pub fn notify_one(&self) {
        self.monitor.notify_one();
    }

    pub fn notify_all(&self) {
        self.monitor.notify_all();
    }

    pub fn into_inner(self) -> T {
        self.monitor.into_inner()
    }
}

/// Exclusive access to a [`Condition`]'s state.
#[must_use = "the state is unlocked as soon as the guard is dropped"]
pub struct ConditionGuard<'a, T> {
    condition: &'a Condition<T>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> ConditionGuard<'a, T> {
    /// Blocks until notified. May wake spuriously.
    pub fn wait(self) -> Self {
        let Self { condition, guard } = self;
        let guard = condition.monitor.signal().wait(guard);
        Self { condition, guard }
    }

    /// Blocks until notified or `timeout` elapses.
    pub fn wait_timeout(self, timeout: Duration) -> (Self, WaitTimeoutResult) {
        let Self { condition, guard } = self;
        let (guard, timed_out) = condition.monitor.signal().wait_timeout(guard, timeout);
        (Self { condition, guard }, WaitTimeoutResult(timed_out))
    }

    /// Blocks while `blocked` returns `true`.
    pub fn wait_while<F>(self, blocked: F) -> Self
    where
        F: FnMut(&mut T) -> bool,
    {
        let Self { condition, guard } = self;
        let guard = condition.monitor.wait_while(guard, blocked);
        Self { condition, guard }
    }

    /// Blocks while `blocked` returns `true`, for at most `timeout`.
    ///
    /// On timeout the guard is still returned so the caller can inspect the
    /// state it gave up on.
    pub fn wait_while_timeout<F>(self, timeout: Duration, blocked: F) -> (Self, WaitTimeoutResult)
    where
        F: FnMut(&mut T) -> bool,
    {
        let Self { condition, guard } = self;
        let (guard, timed_out) = condition
            .monitor
            .wait_while_for(guard, Some(timeout), blocked);
        (Self { condition, guard }, WaitTimeoutResult(timed_out))
    }

    pub fn notify_one(&self) {
        self.condition.notify_one();
    }

    pub fn notify_all(&self) {
        self.condition.notify_all();
    }
}

impl<T> Deref for ConditionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ConditionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ConditionGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionGuard")
            .field("state", &*self.guard)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn waiter_observes_predicate_after_notify() {
        let items = Arc::new(Condition::new(Vec::<u32>::new()));
        let producers: Vec<_> = (0..4)
            .map(|n| {
                let items = Arc::clone(&items);
                thread::spawn(move || {
                    let mut guard = items.lock();
                    guard.push(n);
                    guard.notify_all();
                })
            })
            .collect();

        let guard = items.lock().wait_while(|items| items.len() < 4);
        assert_eq!(guard.len(), 4);
        drop(guard);
        for producer in producers {
            producer.join().unwrap();
        }
    }

    #[test]
    fn predicate_wait_times_out_with_state_intact() {
        let condition = Condition::new(0u32);
        let (guard, result) = condition
            .lock()
            .wait_while_timeout(Duration::from_millis(15), |value| *value < 4);
        assert!(result.timed_out());
        assert_eq!(*guard, 0);
    }

    #[test]
    fn plain_timeout_without_notify() {
        let condition = Condition::new(());
        let (_guard, result) = condition.lock().wait_timeout(Duration::from_millis(5));
        assert!(result.timed_out());
    }

    #[test]
    fn into_inner_returns_state() {
        let condition = Condition::new(3);
        *condition.lock() += 1;
        assert_eq!(condition.into_inner(), 4);
    }
}
