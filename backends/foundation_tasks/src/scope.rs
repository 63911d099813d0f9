//! Exit policy for a group of started units.

use crate::unit::UnitBackend;
use crate::{TaskError, TaskSupervisor};

/// Object-safe view of a supervised unit, erasing its output type.
trait ScopedUnit: Send {
    fn name(&self) -> &str;
    fn is_background(&self) -> bool;
    fn settle(&mut self) -> Result<(), TaskError>;
    fn abandon(&mut self);
}

impl<B: UnitBackend> ScopedUnit for TaskSupervisor<B> {
    fn name(&self) -> &str {
        TaskSupervisor::name(self)
    }

    fn is_background(&self) -> bool {
        TaskSupervisor::is_background(self)
    }

    fn settle(&mut self) -> Result<(), TaskError> {
        self.join().map(|_| ())
    }

    fn abandon(&mut self) {
        TaskSupervisor::abandon(self);
    }
}

/// What happened to each unit when a [`Scope`] exited.
#[derive(Debug, Default)]
pub struct ScopeReport {
    /// Foreground units waited for, in adoption order.
    pub joined: Vec<String>,
    /// Background units given up on.
    pub abandoned: Vec<String>,
    /// Foreground units whose join itself failed.
    pub failed: Vec<(String, TaskError)>,
}

/// Owns started units and applies the daemon policy when it ends.
///
/// On [`Scope::exit`] (or drop) every foreground unit is joined, so exit
/// blocks until they finish. Background units are abandoned: thread units
/// get their cancellation flag raised and are detached, process units are
/// killed and reaped. Whatever an abandoned unit was writing to shared state
/// is left as it was.
///
/// ```
/// use foundation_tasks::{Scope, TaskSupervisor};
/// use std::time::Duration;
///
/// let mut scope = Scope::new();
/// scope.spawn(TaskSupervisor::thread("foreground", |_| Ok(()))).unwrap();
/// scope
///     .spawn(
///         TaskSupervisor::thread("daemon", |cancel| {
///             while !cancel.is_cancelled() {
///                 std::thread::sleep(Duration::from_millis(1));
///             }
///             Ok(())
///         })
///         .background(true),
///     )
///     .unwrap();
///
/// let report = scope.exit();
/// assert_eq!(report.joined, ["foreground"]);
/// assert_eq!(report.abandoned, ["daemon"]);
/// ```
#[derive(Default)]
pub struct Scope {
    units: Vec<Box<dyn ScopedUnit>>,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `unit`, starting it if it has not been started.
    ///
    /// # Errors
    ///
    /// Propagates a failed start; the unit is not adopted then.
    pub fn spawn<B>(&mut self, mut unit: TaskSupervisor<B>) -> Result<(), TaskError>
    where
        B: UnitBackend + 'static,
    {
        if unit.state() == crate::UnitState::Created {
            unit.start()?;
        }
        self.units.push(Box::new(unit));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Joins foreground units and abandons background ones.
    pub fn exit(mut self) -> ScopeReport {
        self.close()
    }

    fn close(&mut self) -> ScopeReport {
        let mut report = ScopeReport::default();
        let (background, foreground): (Vec<_>, Vec<_>) =
            self.units.drain(..).partition(|unit| unit.is_background());

        // Background units keep running until every foreground unit is done.
        for mut unit in foreground {
            let name = unit.name().to_owned();
            match unit.settle() {
                Ok(()) => report.joined.push(name),
                Err(err) => {
                    tracing::warn!(unit = %name, error = %err, "failed to join unit at scope exit");
                    report.failed.push((name, err));
                }
            }
        }
        for mut unit in background {
            unit.abandon();
            report.abandoned.push(unit.name().to_owned());
        }
        tracing::debug!(
            joined = report.joined.len(),
            abandoned = report.abandoned.len(),
            failed = report.failed.len(),
            "scope exited"
        );
        report
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.units.is_empty() {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationFlag;
    use foundation_sync::ResultAggregator;
    use std::time::{Duration, Instant};

    #[test]
    fn foreground_units_block_exit() {
        let results = ResultAggregator::new();
        let mut scope = Scope::new();
        for n in 0..3u32 {
            let results = results.clone();
            scope
                .spawn(TaskSupervisor::thread(format!("worker-{n}"), move |_| {
                    std::thread::sleep(Duration::from_millis(30));
                    results.push(n, ());
                    Ok(())
                }))
                .unwrap();
        }

        let started = Instant::now();
        let report = scope.exit();
        assert!(started.elapsed() >= Duration::from_millis(25));
        assert_eq!(report.joined.len(), 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn background_units_are_not_waited_for() {
        let mut scope = Scope::new();
        scope
            .spawn(
                TaskSupervisor::thread("daemon", |_cancel: CancellationFlag| {
                    std::thread::sleep(Duration::from_secs(30));
                    Ok(())
                })
                .background(true),
            )
            .unwrap();

        let started = Instant::now();
        let report = scope.exit();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.abandoned, ["daemon"]);
        assert!(report.joined.is_empty());
    }

    #[test]
    fn drop_applies_the_same_policy() {
        let results = ResultAggregator::new();
        {
            let mut scope = Scope::new();
            let results = results.clone();
            scope
                .spawn(TaskSupervisor::thread("late", move |_| {
                    std::thread::sleep(Duration::from_millis(10));
                    results.push("late", ());
                    Ok(())
                }))
                .unwrap();
            assert_eq!(scope.len(), 1);
        }
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn background_units_outlive_foreground_work() {
        let marks = ResultAggregator::new();
        let mut scope = Scope::new();

        let daemon_marks = marks.clone();
        scope
            .spawn(
                TaskSupervisor::thread("daemon", move |cancel: CancellationFlag| {
                    while !cancel.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    daemon_marks.push("daemon cancelled", Instant::now());
                    Ok(())
                })
                .background(true),
            )
            .unwrap();
        let foreground_marks = marks.clone();
        scope
            .spawn(TaskSupervisor::thread("foreground", move |_| {
                std::thread::sleep(Duration::from_millis(20));
                foreground_marks.push("foreground done", Instant::now());
                Ok(())
            }))
            .unwrap();

        let report = scope.exit();
        assert_eq!(report.joined, ["foreground"]);
        assert_eq!(report.abandoned, ["daemon"]);

        assert_eq!(marks.wait_for_len_timeout(2, Duration::from_secs(5)), 2);
        let done = marks.get(&"foreground done").unwrap();
        let cancelled = marks.get(&"daemon cancelled").unwrap();
        assert!(cancelled >= done);
    }
}
