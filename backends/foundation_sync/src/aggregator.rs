//! Thread-safe collection of keyed results.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::Monitor;

/// Results gathered from many concurrent producers.
///
/// Clones share one store. Every pushed pair is kept: nothing is lost or
/// duplicated under concurrent `push`, and waiters can block until a given
/// number of results has arrived.
#[derive(Debug)]
pub struct ResultAggregator<K, V> {
    entries: Arc<Monitor<Vec<(K, V)>>>,
}

impl<K, V> Clone for ResultAggregator<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for ResultAggregator<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ResultAggregator<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Monitor::new(Vec::new())),
        }
    }

    pub fn push(&self, key: K, value: V) {
        self.entries.lock().push((key, value));
        self.entries.notify_all();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until at least `count` results are present.
    pub fn wait_for_len(&self, count: usize) {
        let guard = self.entries.lock();
        let _guard = self.entries.wait_while(guard, |entries| entries.len() < count);
    }

    /// Waits at most `timeout` for `count` results; returns how many there
    /// are when it gives up or succeeds.
    #[must_use]
    pub fn wait_for_len_timeout(&self, count: usize, timeout: Duration) -> usize {
        let guard = self.entries.lock();
        let (guard, _) =
            self.entries
                .wait_while_for(guard, Some(timeout), |entries| entries.len() < count);
        guard.len()
    }

    /// Takes the collected pairs in insertion order, leaving other handles
    /// with an empty store.
    #[must_use]
    pub fn take(&self) -> Vec<(K, V)> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl<K: Clone, V: Clone> ResultAggregator<K, V> {
    /// Copies the pairs collected so far, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries.lock().clone()
    }

    /// Consumes this handle. Other live clones keep their view.
    #[must_use]
    pub fn into_vec(self) -> Vec<(K, V)> {
        match Arc::try_unwrap(self.entries) {
            Ok(monitor) => monitor.into_inner(),
            Err(shared) => shared.lock().clone(),
        }
    }
}

impl<K: PartialEq, V: Clone> ResultAggregator<K, V> {
    /// The most recent value pushed under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.clone())
    }
}

impl<K: Ord + Clone, V: Clone> ResultAggregator<K, V> {
    /// Results ordered by key; a later push under the same key wins.
    #[must_use]
    pub fn by_key(&self) -> BTreeMap<K, V> {
        self.entries.lock().iter().cloned().collect()
    }
}
