use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request for work that cannot be killed from outside.
///
/// Thread-backed units receive one of these; `terminate` raises it and the
/// body is expected to poll [`CancellationFlag::is_cancelled`] (for the
/// workload, through `compute_until`).
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.0.swap(true, Ordering::AcqRel) {
            tracing::debug!("cancellation requested");
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
