//! Errors raised by the coordination primitives.

use std::time::Duration;
use thiserror::Error;

/// Failures of the coordination primitives.
///
/// `BrokenBarrier` and `ChannelClosed` reach every party waiting on the
/// primitive when it fails; `Timeout` is always recoverable and leaves the
/// primitive usable.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SyncError {
    /// `release` was called by a thread that does not hold the lock, or on a
    /// lock nobody holds.
    #[error("lock released by a thread that does not hold it")]
    NotOwned,

    /// A strict semaphore was released while already at capacity.
    #[error("semaphore release would exceed its capacity of {capacity}")]
    SemaphoreOverflow {
        /// The configured number of permits.
        capacity: usize,
    },

    /// The barrier cycle was aborted by a timeout, an explicit abort or a reset.
    #[error("barrier is broken")]
    BrokenBarrier,

    /// The peer endpoint closed and no buffered data remains.
    #[error("channel closed")]
    ChannelClosed,

    /// A bounded wait elapsed before the awaited condition held.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The wait limit that elapsed.
        timeout: Duration,
    },

    /// `task_done` was called more times than items were put.
    #[error("task_done called more times than items were put")]
    TaskDoneOverflow,

    /// A frame on a stream channel could not be encoded or decoded.
    #[error("failed to encode or decode frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// The underlying stream failed.
    #[error("stream i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            SyncError::NotOwned => "sync_not_owned",
            SyncError::SemaphoreOverflow { .. } => "sync_semaphore_overflow",
            SyncError::BrokenBarrier => "sync_broken_barrier",
            SyncError::ChannelClosed => "sync_channel_closed",
            SyncError::Timeout { .. } => "sync_timeout",
            SyncError::TaskDoneOverflow => "sync_task_done_overflow",
            SyncError::Codec(_) => "sync_codec",
            SyncError::Io(_) => "sync_io",
        }
    }

    /// Indicates whether the caller may simply retry the operation.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(SyncError::NotOwned.as_label(), "sync_not_owned");
        assert_eq!(
            SyncError::SemaphoreOverflow { capacity: 2 }.as_label(),
            "sync_semaphore_overflow"
        );
        assert_eq!(SyncError::BrokenBarrier.as_label(), "sync_broken_barrier");
    }

    #[test]
    fn only_timeouts_are_timeouts() {
        let err = SyncError::Timeout {
            timeout: Duration::from_millis(5),
        };
        assert!(err.is_timeout());
        assert!(!SyncError::ChannelClosed.is_timeout());
        assert_eq!(err.to_string(), "timed out after 5ms");
    }
}
