//! One-bit broadcast flag.

use std::time::Duration;

use crate::monitor::Monitor;

/// A boolean flag threads can block on until it is set.
///
/// `set` wakes every waiter; the flag stays set (and later waits return at
/// once) until `clear`.
#[derive(Debug, Default)]
pub struct Event {
    monitor: Monitor<bool>,
}

impl Event {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            monitor: Monitor::new(false),
        }
    }

    pub fn set(&self) {
        let mut flag = self.monitor.lock();
        if *flag {
            return;
        }
        *flag = true;
        drop(flag);
        self.monitor.notify_all();
        tracing::debug!("event set");
    }

    pub fn clear(&self) {
        *self.monitor.lock() = false;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.monitor.lock()
    }

    /// Blocks until the flag is set.
    pub fn wait(&self) {
        let flag = self.monitor.lock();
        let _flag = self.monitor.wait_while(flag, |flag| !*flag);
    }

    /// Blocks until the flag is set or `timeout` elapses; returns the flag.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let flag = self.monitor.lock();
        let (flag, _) = self.monitor.wait_while_for(flag, Some(timeout), |flag| !*flag);
        *flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_releases_all_waiters() {
        let event = Arc::new(Event::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || event.wait())
            })
            .collect();
        thread::sleep(Duration::from_millis(10));
        event.set();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert!(event.is_set());
    }

    #[test]
    fn wait_after_set_returns_immediately_until_cleared() {
        let event = Event::new();
        event.set();
        assert!(event.wait_timeout(Duration::ZERO));
        event.clear();
        assert!(!event.wait_timeout(Duration::from_millis(5)));
    }
}
