//! Timestamped phase records for ordering assertions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use derive_more::Display;

/// One recorded event: which actor reached which phase, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{actor}@{phase}")]
pub struct Mark {
    pub actor: usize,
    pub phase: &'static str,
    pub at: Instant,
}

/// Shared, append-only list of [`Mark`]s.
///
/// ```
/// use foundation_testing::Timeline;
///
/// let timeline = Timeline::new();
/// timeline.record(0, "before");
/// timeline.record(0, "after");
/// assert!(timeline.all_before("before", "after"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    marks: Arc<Mutex<Vec<Mark>>>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, actor: usize, phase: &'static str) {
        self.record_at(actor, phase, Instant::now());
    }

    pub fn record_at(&self, actor: usize, phase: &'static str, at: Instant) {
        let mark = Mark { actor, phase, at };
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(mark);
    }

    #[must_use]
    pub fn marks(&self) -> Vec<Mark> {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Marks for `phase`, in recording order.
    #[must_use]
    pub fn phase(&self, phase: &str) -> Vec<Mark> {
        self.marks()
            .into_iter()
            .filter(|mark| mark.phase == phase)
            .collect()
    }

    /// Whether every `earlier` mark precedes (or ties with) every `later`
    /// mark. Vacuously true when either phase is empty.
    #[must_use]
    pub fn all_before(&self, earlier: &str, later: &str) -> bool {
        self.compare_bounds(earlier, later, |earlier, later| earlier <= later)
    }

    /// Like [`Timeline::all_before`], but a tie counts as a violation.
    #[must_use]
    pub fn all_strictly_before(&self, earlier: &str, later: &str) -> bool {
        self.compare_bounds(earlier, later, |earlier, later| earlier < later)
    }

    fn compare_bounds(&self, earlier: &str, later: &str, holds: impl Fn(Instant, Instant) -> bool) -> bool {
        let latest_earlier = self.phase(earlier).iter().map(|mark| mark.at).max();
        let earliest_later = self.phase(later).iter().map(|mark| mark.at).min();
        match (latest_earlier, earliest_later) {
            (Some(earlier), Some(later)) => holds(earlier, later),
            _ => true,
        }
    }

    /// Actor ids in the order they reached `phase`.
    #[must_use]
    pub fn order_of(&self, phase: &str) -> Vec<usize> {
        let mut marks = self.phase(phase);
        marks.sort_by_key(|mark| mark.at);
        marks.into_iter().map(|mark| mark.actor).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn detects_interleaved_phases() {
        let timeline = Timeline::new();
        timeline.record(0, "a");
        thread::sleep(Duration::from_millis(2));
        timeline.record(1, "b");
        thread::sleep(Duration::from_millis(2));
        timeline.record(2, "a");
        assert!(!timeline.all_before("a", "b"));
        assert!(timeline.all_before("a", "missing"));
        assert_eq!(timeline.order_of("a"), vec![0, 2]);
        assert_eq!(timeline.phase("b")[0].to_string(), "1@b");
    }

    #[test]
    fn ties_only_pass_the_lenient_check() {
        let timeline = Timeline::new();
        let now = Instant::now();
        timeline.record_at(0, "a", now);
        timeline.record_at(1, "b", now);
        assert!(timeline.all_before("a", "b"));
        assert!(!timeline.all_strictly_before("a", "b"));

        timeline.record_at(2, "c", now + Duration::from_millis(1));
        assert!(timeline.all_strictly_before("b", "c"));
        assert!(timeline.all_strictly_before("c", "missing"));
    }
}
