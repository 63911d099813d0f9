//! Bounded multi-producer multi-consumer FIFO with completion tracking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitor::{Monitor, Signal};
use crate::SyncError;

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

#[derive(Debug)]
struct Inner<T> {
    // The monitor's own signal announces "not empty".
    monitor: Monitor<QueueState<T>>,
    not_full: Signal,
    drained: Signal,
    capacity: Option<usize>,
}

/// A FIFO queue shared by cloning the handle.
///
/// Every `put` counts one unfinished task; consumers call
/// [`BoundedQueue::task_done`] once per item they finished with, and
/// [`BoundedQueue::join`] blocks until the count is back to zero.
///
/// ```
/// use foundation_sync::BoundedQueue;
/// use std::thread;
///
/// let queue = BoundedQueue::bounded(2);
/// let consumer = {
///     let queue = queue.clone();
///     thread::spawn(move || {
///         for _ in 0..5 {
///             let _item: u32 = queue.get();
///             queue.task_done().unwrap();
///         }
///     })
/// };
/// for item in 0..5 {
///     queue.put(item);
/// }
/// queue.join();
/// consumer.join().unwrap();
/// ```
#[derive(Debug)]
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// A queue holding at most `capacity` items; `put` blocks when full.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        Self::with_capacity(Some(capacity))
    }

    /// A queue whose `put` never blocks.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                monitor: Monitor::new(QueueState {
                    items: VecDeque::with_capacity(capacity.unwrap_or_default()),
                    unfinished: 0,
                }),
                not_full: Signal::new(),
                drained: Signal::new(),
                capacity,
            }),
        }
    }

    fn is_full(&self, state: &QueueState<T>) -> bool {
        self.inner
            .capacity
            .is_some_and(|capacity| state.items.len() >= capacity)
    }

    fn push(&self, state: &mut QueueState<T>, item: T) {
        state.items.push_back(item);
        state.unfinished += 1;
        self.inner.monitor.notify_one();
    }

    fn pop(&self, state: &mut QueueState<T>) -> Option<T> {
        let item = state.items.pop_front()?;
        self.inner.not_full.notify_one();
        Some(item)
    }

    /// Appends `item`, blocking while the queue is full.
    pub fn put(&self, item: T) {
        let guard = self.inner.monitor.lock();
        let mut guard = self
            .inner
            .not_full
            .wait_while(guard, |state| self.is_full(state));
        self.push(&mut guard, item);
    }

    /// Appends `item` if there is room right now; hands it back otherwise.
    ///
    /// # Errors
    ///
    /// Returns the item when the queue is full.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut guard = self.inner.monitor.lock();
        if self.is_full(&guard) {
            return Err(item);
        }
        self.push(&mut guard, item);
        Ok(())
    }

    /// Appends `item`, waiting at most `timeout` for room.
    ///
    /// # Errors
    ///
    /// Returns the item when the queue is still full after `timeout`.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        let guard = self.inner.monitor.lock();
        let (mut guard, timed_out) =
            self.inner
                .not_full
                .wait_while_for(guard, Some(timeout), |state| self.is_full(state));
        if timed_out {
            return Err(item);
        }
        self.push(&mut guard, item);
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    pub fn get(&self) -> T {
        let mut guard = self.inner.monitor.lock();
        loop {
            if let Some(item) = self.pop(&mut guard) {
                return item;
            }
            guard = self.inner.monitor.signal().wait(guard);
        }
    }

    pub fn try_get(&self) -> Option<T> {
        let mut guard = self.inner.monitor.lock();
        self.pop(&mut guard)
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] when nothing arrives within `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, SyncError> {
        let guard = self.inner.monitor.lock();
        let (mut guard, _) =
            self.inner
                .monitor
                .wait_while_for(guard, Some(timeout), |state| state.items.is_empty());
        self.pop(&mut guard).ok_or(SyncError::Timeout { timeout })
    }

    /// Marks one previously taken item as fully processed.
    ///
    /// # Errors
    ///
    /// [`SyncError::TaskDoneOverflow`] when every put item is already done.
    pub fn task_done(&self) -> Result<(), SyncError> {
        let mut guard = self.inner.monitor.lock();
        if guard.unfinished == 0 {
            return Err(SyncError::TaskDoneOverflow);
        }
        guard.unfinished -= 1;
        if guard.unfinished == 0 {
            drop(guard);
            self.inner.drained.notify_all();
        }
        Ok(())
    }

    /// Blocks until every item ever put has been marked done.
    pub fn join(&self) {
        let guard = self.inner.monitor.lock();
        let _guard = self
            .inner
            .drained
            .wait_while(guard, |state| state.unfinished > 0);
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] when unfinished items remain after `timeout`.
    pub fn join_timeout(&self, timeout: Duration) -> Result<(), SyncError> {
        let guard = self.inner.monitor.lock();
        let (_guard, timed_out) =
            self.inner
                .drained
                .wait_while_for(guard, Some(timeout), |state| state.unfinished > 0);
        if timed_out {
            return Err(SyncError::Timeout { timeout });
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.monitor.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items put but not yet marked done, whether still queued or taken.
    #[must_use]
    pub fn unfinished(&self) -> usize {
        self.inner.monitor.lock().unfinished
    }

    /// `None` for an unbounded queue.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }
}

/// An item or an end-of-work marker travelling through a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum Envelope<T> {
    Item(T),
    /// Tells exactly one consumer to stop.
    Stop,
}

impl<T> BoundedQueue<Envelope<T>> {
    pub fn put_item(&self, item: T) {
        self.put(Envelope::Item(item));
    }

    /// Queues `consumers` stop markers, one per consumer.
    pub fn put_stop(&self, consumers: usize) {
        for _ in 0..consumers {
            self.put(Envelope::Stop);
        }
    }

    /// Consumer loop: hands each item to `handle` and marks it done, until a
    /// stop marker arrives (which is marked done as well).
    ///
    /// Returns the number of items handled.
    ///
    /// # Errors
    ///
    /// [`SyncError::TaskDoneOverflow`] if another party marked this
    /// consumer's items done behind its back.
    pub fn drain_until_stop<F>(&self, mut handle: F) -> Result<usize, SyncError>
    where
        F: FnMut(T),
    {
        let mut handled = 0;
        loop {
            match self.get() {
                Envelope::Item(item) => {
                    handle(item);
                    handled += 1;
                    self.task_done()?;
                }
                Envelope::Stop => {
                    self.task_done()?;
                    return Ok(handled);
                }
            }
        }
    }
}
