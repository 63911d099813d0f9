//! Cyclic rendezvous for a fixed number of parties.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::Monitor;
use crate::SyncError;

const PENDING: u8 = 0;
const RELEASED: u8 = 1;
const BROKEN: u8 = 2;

/// How one barrier cycle ended. Shared by the parties of that cycle so a
/// waiter that wakes late still sees its own cycle's outcome, even if later
/// cycles have started since.
#[derive(Debug)]
struct Cycle(AtomicU8);

impl Cycle {
    fn pending() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(PENDING)))
    }

    // Only touched while the barrier mutex is held, so relaxed is enough.
    fn outcome(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    fn settle(&self, outcome: u8) {
        self.0.store(outcome, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
    cycle: Arc<Cycle>,
}

impl BarrierState {
    fn next_cycle(&mut self) {
        self.arrived = 0;
        self.generation += 1;
        self.cycle = Cycle::pending();
    }

    fn break_cycle(&mut self) {
        self.cycle.settle(BROKEN);
        self.broken = true;
        self.next_cycle();
    }
}

/// What a successful [`Barrier::wait`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    is_leader: bool,
    generation: u64,
}

impl BarrierWaitResult {
    /// Exactly one party per cycle, the last to arrive, is the leader.
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// The cycle this party was released from, counting from zero.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// A reusable barrier for `parties` participants.
///
/// No party returns from [`Barrier::wait`] of a cycle before all parties of
/// that cycle have arrived. A timeout, [`Barrier::abort`] or
/// [`Barrier::reset`] breaks the current cycle and every waiter in it gets
/// [`SyncError::BrokenBarrier`]. After `abort` or a timeout the barrier stays
/// broken until [`Barrier::reset`].
///
/// ```
/// use foundation_sync::Barrier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let barrier = Arc::new(Barrier::new(3));
/// let handles: Vec<_> = (0..3)
///     .map(|_| {
///         let barrier = Arc::clone(&barrier);
///         thread::spawn(move || barrier.wait().unwrap().is_leader())
///     })
///     .collect();
/// let leaders = handles
///     .into_iter()
///     .map(|handle| handle.join().unwrap())
///     .filter(|leader| *leader)
///     .count();
/// assert_eq!(leaders, 1);
/// ```
#[derive(Debug)]
pub struct Barrier {
    monitor: Monitor<BarrierState>,
    parties: usize,
}

impl Barrier {
    /// # Panics
    ///
    /// Panics if `parties` is 0.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "barrier parties must be > 0");
        Self {
            monitor: Monitor::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: false,
                cycle: Cycle::pending(),
            }),
            parties,
        }
    }

    /// Waits until all parties of the current cycle have arrived.
    ///
    /// # Errors
    ///
    /// [`SyncError::BrokenBarrier`] when the barrier is already broken or the
    /// cycle breaks while waiting.
    pub fn wait(&self) -> Result<BarrierWaitResult, SyncError> {
        self.wait_for(None)
    }

    /// Like [`Barrier::wait`], but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`SyncError::BrokenBarrier`] for this party and every other waiter of
    /// the cycle when `timeout` elapses before the cycle completes.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<BarrierWaitResult, SyncError> {
        self.wait_for(Some(timeout))
    }

    fn wait_for(&self, timeout: Option<Duration>) -> Result<BarrierWaitResult, SyncError> {
        let mut guard = self.monitor.lock();
        if guard.broken {
            return Err(SyncError::BrokenBarrier);
        }

        let generation = guard.generation;
        let cycle = Arc::clone(&guard.cycle);
        guard.arrived += 1;

        if guard.arrived == self.parties {
            cycle.settle(RELEASED);
            guard.next_cycle();
            drop(guard);
            self.monitor.notify_all();
            tracing::debug!(generation, parties = self.parties, "barrier released");
            return Ok(BarrierWaitResult {
                is_leader: true,
                generation,
            });
        }

        let (mut guard, _) =
            self.monitor
                .wait_while_for(guard, timeout, |_| cycle.outcome() == PENDING);
        match cycle.outcome() {
            RELEASED => Ok(BarrierWaitResult {
                is_leader: false,
                generation,
            }),
            BROKEN => Err(SyncError::BrokenBarrier),
            _ => {
                tracing::warn!(generation, ?timeout, "barrier wait timed out, breaking cycle");
                guard.break_cycle();
                drop(guard);
                self.monitor.notify_all();
                Err(SyncError::BrokenBarrier)
            }
        }
    }

    /// Breaks the barrier: current and future waiters fail until
    /// [`Barrier::reset`].
    pub fn abort(&self) {
        let mut guard = self.monitor.lock();
        tracing::warn!(waiting = guard.arrived, "barrier aborted");
        guard.break_cycle();
        drop(guard);
        self.monitor.notify_all();
    }

    /// Returns the barrier to its initial, unbroken state. Parties still
    /// waiting on the old cycle fail with [`SyncError::BrokenBarrier`].
    pub fn reset(&self) {
        let mut guard = self.monitor.lock();
        if guard.arrived > 0 {
            guard.cycle.settle(BROKEN);
        }
        guard.broken = false;
        guard.next_cycle();
        drop(guard);
        self.monitor.notify_all();
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.monitor.lock().broken
    }

    #[must_use]
    pub const fn parties(&self) -> usize {
        self.parties
    }

    /// Parties currently blocked in the open cycle.
    #[must_use]
    pub fn n_waiting(&self) -> usize {
        self.monitor.lock().arrived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tracing_test::traced_test;

    fn spawn_waiters(
        barrier: &Arc<Barrier>,
        count: usize,
    ) -> Vec<thread::JoinHandle<Result<BarrierWaitResult, SyncError>>> {
        (0..count)
            .map(|_| {
                let barrier = Arc::clone(barrier);
                thread::spawn(move || barrier.wait())
            })
            .collect()
    }

    fn wait_for_arrivals(barrier: &Barrier, count: usize) {
        while barrier.n_waiting() < count {
            thread::yield_now();
        }
    }

    #[test]
    fn single_party_never_blocks() {
        let barrier = Barrier::new(1);
        let first = barrier.wait().unwrap();
        let second = barrier.wait().unwrap();
        assert!(first.is_leader());
        assert_eq!(second.generation(), 1);
    }

    #[test]
    #[should_panic(expected = "barrier parties must be > 0")]
    fn zero_parties_is_rejected() {
        let _ = Barrier::new(0);
    }

    #[test]
    fn cycles_are_reusable() {
        let barrier = Arc::new(Barrier::new(3));
        for round in 0..4u64 {
            let results: Vec<_> = spawn_waiters(&barrier, 3)
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .collect();
            assert_eq!(results.iter().filter(|r| r.is_leader()).count(), 1);
            assert!(results.iter().all(|r| r.generation() == round));
        }
    }

    #[test]
    fn timeout_breaks_the_cycle_for_everyone() {
        let barrier = Arc::new(Barrier::new(3));
        let waiter = spawn_waiters(&barrier, 1).pop().unwrap();
        wait_for_arrivals(&barrier, 1);

        let err = barrier.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, SyncError::BrokenBarrier));
        assert!(matches!(waiter.join().unwrap(), Err(SyncError::BrokenBarrier)));
        assert!(barrier.is_broken());
        assert!(matches!(barrier.wait(), Err(SyncError::BrokenBarrier)));
    }

    #[test]
    fn abort_releases_waiters_and_reset_recovers() {
        let barrier = Arc::new(Barrier::new(3));
        let waiters = spawn_waiters(&barrier, 2);
        wait_for_arrivals(&barrier, 2);

        barrier.abort();
        for waiter in waiters {
            assert!(matches!(waiter.join().unwrap(), Err(SyncError::BrokenBarrier)));
        }

        barrier.reset();
        assert!(!barrier.is_broken());
        let results: Vec<_> = spawn_waiters(&barrier, 3)
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn reset_breaks_only_the_open_cycle() {
        let barrier = Arc::new(Barrier::new(2));
        let waiter = spawn_waiters(&barrier, 1).pop().unwrap();
        wait_for_arrivals(&barrier, 1);

        barrier.reset();
        assert!(matches!(waiter.join().unwrap(), Err(SyncError::BrokenBarrier)));
        assert!(!barrier.is_broken());
        assert_eq!(barrier.n_waiting(), 0);
    }

    #[test]
    #[traced_test]
    fn breaking_the_barrier_is_logged() {
        let barrier = Barrier::new(2);
        assert!(barrier.wait_timeout(Duration::from_millis(5)).is_err());
        assert!(logs_contain("barrier wait timed out, breaking cycle"));

        barrier.reset();
        barrier.abort();
        assert!(logs_contain("barrier aborted"));
    }
}
