//! The mutex + condvar pairing every blocking primitive in this crate sits on.
//!
//! Poisoning is recovered rather than propagated: a thread that panicked while
//! holding one of our locks cannot leave the protected state half-updated,
//! since every critical section here is a handful of field writes.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A condition variable that recovers from poisoning.
#[derive(Debug, Default)]
pub(crate) struct Signal(Condvar);

impl Signal {
    pub(crate) const fn new() -> Self {
        Self(Condvar::new())
    }

    pub(crate) fn wait<'a, S>(&self, guard: MutexGuard<'a, S>) -> MutexGuard<'a, S> {
        self.0.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the guard and `true` when the timeout elapsed without a wakeup.
    pub(crate) fn wait_timeout<'a, S>(
        &self,
        guard: MutexGuard<'a, S>,
        timeout: Duration,
    ) -> (MutexGuard<'a, S>, bool) {
        let (guard, result) = self
            .0
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, result.timed_out())
    }

    pub(crate) fn wait_while<'a, S, F>(&self, mut guard: MutexGuard<'a, S>, mut blocked: F) -> MutexGuard<'a, S>
    where
        F: FnMut(&mut S) -> bool,
    {
        while blocked(&mut guard) {
            guard = self.wait(guard);
        }
        guard
    }

    /// Waits while `blocked` holds, for at most `timeout` (`None` waits forever).
    ///
    /// Returns the guard and `true` when the deadline passed with `blocked`
    /// still holding. Spurious wakeups are absorbed against a fixed deadline.
    pub(crate) fn wait_while_for<'a, S, F>(
        &self,
        mut guard: MutexGuard<'a, S>,
        timeout: Option<Duration>,
        mut blocked: F,
    ) -> (MutexGuard<'a, S>, bool)
    where
        F: FnMut(&mut S) -> bool,
    {
        let Some(timeout) = timeout else {
            return (self.wait_while(guard, blocked), false);
        };

        let deadline = Instant::now().checked_add(timeout);
        while blocked(&mut guard) {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return (guard, true);
            }
            guard = self.wait_timeout(guard, remaining).0;
        }
        (guard, false)
    }

    pub(crate) fn notify_one(&self) {
        self.0.notify_one();
    }

    pub(crate) fn notify_all(&self) {
        self.0.notify_all();
    }
}

/// State guarded by a mutex, paired with the signal that announces changes
/// to it.
#[derive(Debug, Default)]
pub(crate) struct Monitor<S> {
    state: Mutex<S>,
    signal: Signal,
}

impl<S> Monitor<S> {
    pub(crate) const fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            signal: Signal::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn signal(&self) -> &Signal {
        &self.signal
    }

    pub(crate) fn wait_while<'a, F>(&self, guard: MutexGuard<'a, S>, blocked: F) -> MutexGuard<'a, S>
    where
        F: FnMut(&mut S) -> bool,
    {
        self.signal.wait_while(guard, blocked)
    }

    pub(crate) fn wait_while_for<'a, F>(
        &self,
        guard: MutexGuard<'a, S>,
        timeout: Option<Duration>,
        blocked: F,
    ) -> (MutexGuard<'a, S>, bool)
    where
        F: FnMut(&mut S) -> bool,
    {
        self.signal.wait_while_for(guard, timeout, blocked)
    }

    pub(crate) fn notify_one(&self) {
        self.signal.notify_one();
    }

    pub(crate) fn notify_all(&self) {
        self.signal.notify_all();
    }

    pub(crate) fn into_inner(self) -> S {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn poisoned_state_is_recovered() {
        let monitor = Arc::new(Monitor::new(0u32));
        let clone = Arc::clone(&monitor);
        let outcome = thread::spawn(move || {
            let mut guard = clone.lock();
            *guard = 7;
            panic!("poison the mutex");
        })
        .join();
        assert!(outcome.is_err());
        assert_eq!(*monitor.lock(), 7);
    }

    #[test]
    fn wait_while_for_reports_deadline() {
        let monitor = Monitor::new(false);
        let guard = monitor.lock();
        let (guard, timed_out) =
            monitor.wait_while_for(guard, Some(Duration::from_millis(20)), |ready| !*ready);
        assert!(timed_out);
        assert!(!*guard);
    }

    #[test]
    fn wait_while_for_returns_once_condition_clears() {
        let monitor = Arc::new(Monitor::new(false));
        let clone = Arc::clone(&monitor);
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *clone.lock() = true;
            clone.notify_all();
        });

        let guard = monitor.lock();
        let (guard, timed_out) =
            monitor.wait_while_for(guard, Some(Duration::from_secs(5)), |ready| !*ready);
        assert!(!timed_out);
        assert!(*guard);
        drop(guard);
        setter.join().unwrap();
    }
}
