//! In-process duplex channel with exactly two endpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::SyncError;

/// One end of a [`duplex`] channel: sends `S`, receives `R`.
///
/// Messages arrive in send order. Endpoints are not `Clone`, so each
/// direction has exactly one writer and one reader. Dropping an endpoint
/// closes it.
#[derive(Debug)]
pub struct Endpoint<S, R> {
    src: Option<Sender<S>>,
    dst: Option<Receiver<R>>,
    // Raised by this end on close; the peer reads it as `peer_closed`.
    closed: Arc<AtomicBool>,
    peer_closed: Arc<AtomicBool>,
}

/// Creates a connected pair of endpoints, each direction buffering up to
/// `capacity` messages (at least one).
///
/// ```
/// use foundation_sync::duplex;
/// use std::thread;
///
/// let (parent, child) = duplex::<String, usize>(4);
/// let worker = thread::spawn(move || {
///     let text = child.receive().unwrap();
///     child.send(text.len()).unwrap();
/// });
/// parent.send("hello".to_string()).unwrap();
/// assert_eq!(parent.receive().unwrap(), 5);
/// worker.join().unwrap();
/// ```
#[must_use]
pub fn duplex<A, B>(capacity: usize) -> (Endpoint<A, B>, Endpoint<B, A>) {
    let capacity = capacity.max(1);
    let (forward_tx, forward_rx) = channel::bounded(capacity);
    let (backward_tx, backward_rx) = channel::bounded(capacity);
    let left_closed = Arc::new(AtomicBool::new(false));
    let right_closed = Arc::new(AtomicBool::new(false));
    (
        Endpoint {
            src: Some(forward_tx),
            dst: Some(backward_rx),
            closed: Arc::clone(&left_closed),
            peer_closed: Arc::clone(&right_closed),
        },
        Endpoint {
            src: Some(backward_tx),
            dst: Some(forward_rx),
            closed: right_closed,
            peer_closed: left_closed,
        },
    )
}

impl<S, R> Endpoint<S, R> {
    /// Sends `value`, blocking while the peer's buffer is full.
    ///
    /// # Errors
    ///
    /// [`SyncError::ChannelClosed`] when either side has closed.
    pub fn send(&self, value: S) -> Result<(), SyncError> {
        match &self.src {
            Some(src) => src.send(value).map_err(|_| SyncError::ChannelClosed),
            None => Err(SyncError::ChannelClosed),
        }
    }

    /// Receives the next message, blocking until one arrives.
    ///
    /// # Errors
    ///
    /// [`SyncError::ChannelClosed`] once the peer has closed and every
    /// message it sent has been received.
    pub fn receive(&self) -> Result<R, SyncError> {
        match &self.dst {
            Some(dst) => dst.recv().map_err(|_| SyncError::ChannelClosed),
            None => Err(SyncError::ChannelClosed),
        }
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] when nothing arrives within `timeout`, and
    /// [`SyncError::ChannelClosed`] as for [`Endpoint::receive`].
    pub fn receive_timeout(&self, timeout: Duration) -> Result<R, SyncError> {
        let Some(dst) = &self.dst else {
            return Err(SyncError::ChannelClosed);
        };
        dst.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => SyncError::Timeout { timeout },
            RecvTimeoutError::Disconnected => SyncError::ChannelClosed,
        })
    }

    /// Returns a pending message without blocking.
    ///
    /// # Errors
    ///
    /// [`SyncError::ChannelClosed`] when nothing is pending and the peer has
    /// closed.
    pub fn try_receive(&self) -> Result<Option<R>, SyncError> {
        let Some(dst) = &self.dst else {
            return Err(SyncError::ChannelClosed);
        };
        match dst.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SyncError::ChannelClosed),
        }
    }

    /// Closes both directions of this end. Messages already sent remain
    /// receivable by the peer; messages still queued for this end are
    /// discarded. Idempotent.
    pub fn close(&mut self) {
        if self.src.is_none() && self.dst.is_none() {
            return;
        }
        self.closed.store(true, Ordering::Release);
        self.src = None;
        self.dst = None;
        tracing::debug!("duplex endpoint closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.src.is_none()
    }

    /// Whether the peer has closed its end.
    #[must_use]
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed.load(Ordering::Acquire)
    }
}

impl<S, R> Drop for Endpoint<S, R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn messages_flow_both_ways_in_order() {
        let (left, right) = duplex::<u32, u32>(2);
        let echo = thread::spawn(move || {
            while let Ok(value) = right.receive() {
                right.send(value * 10).unwrap();
            }
        });
        for value in 1..=5 {
            left.send(value).unwrap();
            assert_eq!(left.receive().unwrap(), value * 10);
        }
        drop(left);
        echo.join().unwrap();
    }

    #[test]
    fn pending_data_survives_peer_close() {
        let (mut left, right) = duplex::<&str, ()>(4);
        left.send("one").unwrap();
        left.send("two").unwrap();
        left.close();
        assert!(left.is_closed());
        assert!(right.is_peer_closed());
        assert_eq!(right.receive().unwrap(), "one");
        assert_eq!(right.try_receive().unwrap(), Some("two"));
        assert!(matches!(right.receive(), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn closed_end_refuses_traffic() {
        let (mut left, _right) = duplex::<u8, u8>(1);
        left.close();
        left.close();
        assert!(matches!(left.send(1), Err(SyncError::ChannelClosed)));
        assert!(matches!(left.try_receive(), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn send_after_peer_drop_fails() {
        let (left, right) = duplex::<u8, u8>(1);
        drop(right);
        assert!(matches!(left.send(1), Err(SyncError::ChannelClosed)));
        assert!(matches!(left.receive(), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn blocked_sender_is_released_by_close() {
        let (left, right) = duplex::<u8, u8>(1);
        left.send(1).unwrap();
        let sender = thread::spawn(move || left.send(2));
        thread::sleep(Duration::from_millis(10));
        drop(right);
        assert!(matches!(sender.join().unwrap(), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn blocked_receiver_is_released_by_peer_close() {
        let (left, right) = duplex::<u8, u8>(1);
        let receiver = thread::spawn(move || left.receive());
        thread::sleep(Duration::from_millis(10));
        drop(right);
        assert!(matches!(receiver.join().unwrap(), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn receive_timeout_on_idle_channel() {
        let (left, _right) = duplex::<u8, u8>(1);
        assert!(left
            .receive_timeout(Duration::from_millis(5))
            .unwrap_err()
            .is_timeout());
        assert_eq!(left.try_receive().unwrap(), None);
    }
}
