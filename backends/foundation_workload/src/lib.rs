//! The unit of work every coordination strategy in this workspace runs.
//!
//! [`compute`] counts the primes strictly below `size` by trial division and
//! accumulates `sqrt(i + 1) + sin(i) * cos(i) + ln(i + 1)` over `[0, size)`.
//! It is pure and deterministic, so two runs with the same size always
//! produce bit-identical [`WorkResult`]s no matter which thread, pool or
//! process executed them.
//!
//! [`Task`] pairs a size with a [`TaskId`] so producers and consumers can
//! hand work around, and [`WorkRequest`] / [`WorkReply`] are the records the
//! process-isolated worker exchanges over its pipe.

mod errors;
mod task;
mod wire;
mod workload;

pub use errors::WorkloadError;
pub use task::{Task, TaskId};
pub use wire::{WorkReply, WorkRequest};
pub use workload::{compute, compute_until, WorkResult};
