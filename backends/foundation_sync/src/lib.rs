//! Blocking coordination primitives for threads, plus the channels used to
//! talk to worker processes.
//!
//! Everything here is built on one pattern: a `std::sync::Mutex` guarding a
//! small state struct, with `Condvar`s announcing changes to it. Waits come
//! in an unbounded and a timed flavour; the timed ones report elapsed
//! deadlines as [`SyncError::Timeout`] and never leave a primitive in a
//! different state than before the call.
//!
//! ```
//! use foundation_sync::{BoundedQueue, Semaphore};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let slots = Arc::new(Semaphore::new(2));
//! let queue = BoundedQueue::unbounded();
//! let workers: Vec<_> = (0..4)
//!     .map(|n| {
//!         let (slots, queue) = (Arc::clone(&slots), queue.clone());
//!         thread::spawn(move || {
//!             let _permit = slots.permit();
//!             queue.put(n);
//!         })
//!     })
//!     .collect();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! assert_eq!(queue.len(), 4);
//! ```

mod aggregator;
mod barrier;
mod channel;
mod condition;
mod errors;
mod event;
mod lock;
mod monitor;
mod queue;
mod reentrant;
mod semaphore;
mod stream;

pub use aggregator::ResultAggregator;
pub use barrier::{Barrier, BarrierWaitResult};
pub use channel::{duplex, Endpoint};
pub use condition::{Condition, ConditionGuard, WaitTimeoutResult};
pub use errors::SyncError;
pub use event::Event;
pub use lock::{Lock, LockGuard, Ownership};
pub use queue::{BoundedQueue, Envelope};
pub use reentrant::{ReentrantGuard, ReentrantLock};
pub use semaphore::{Semaphore, SemaphoreMode, SemaphorePermit};
pub use stream::{StdioEndpoint, StreamEndpoint};
