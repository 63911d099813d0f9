//! Counts how many threads are inside a region at the same time.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks current and peak occupancy of a code region.
///
/// ```
/// use foundation_testing::ConcurrencyGauge;
///
/// let gauge = ConcurrencyGauge::new();
/// {
///     let _a = gauge.enter();
///     let _b = gauge.enter();
///     assert_eq!(gauge.current(), 2);
/// }
/// assert_eq!(gauge.current(), 0);
/// assert_eq!(gauge.high_water_mark(), 2);
/// ```
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    entries: AtomicUsize,
}

impl ConcurrencyGauge {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            entries: AtomicUsize::new(0),
        }
    }

    /// Marks the calling thread as inside the region until the guard drops.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.entries.fetch_add(1, Ordering::Relaxed);
        GaugeGuard { gauge: self }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// The largest occupancy ever observed.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Total number of `enter` calls.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }
}

/// Occupancy token returned by [`ConcurrencyGauge::enter`].
#[must_use = "the region is left as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GaugeGuard<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn serialised_entries_never_overlap() {
        let gauge = ConcurrencyGauge::new();
        let gate = Mutex::new(());
        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        let _held = gate.lock().unwrap();
                        let _inside = gauge.enter();
                    }
                });
            }
        });
        assert_eq!(gauge.high_water_mark(), 1);
        assert_eq!(gauge.entries(), 400);
        assert_eq!(gauge.current(), 0);
    }
}
