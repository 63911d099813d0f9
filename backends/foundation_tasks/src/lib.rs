//! Running work on supervised execution units.
//!
//! - [`TaskSupervisor`] drives one thread or child process through
//!   `Created -> Running -> {Completed, TimedOut, Terminated}`.
//! - [`Scope`] joins foreground units on exit and abandons background ones.
//! - [`WorkerPool`] keeps a fixed set of worker threads busy from one queue,
//!   isolating each job's failure in its own [`TaskHandle`].
//! - [`serve_worker`] and [`run_in_process`] move a [`foundation_workload::Task`]
//!   across a process boundary as newline-delimited JSON.

mod cancel;
mod config;
mod errors;
mod pool;
mod scope;
mod supervisor;
mod unit;
mod worker;

pub use cancel::CancellationFlag;
pub use config::{desired_workers, CoordinationConfig, WORKERS_ENV, WORKER_PROGRAM_ENV};
pub use errors::TaskError;
pub use pool::{PoolConfig, TaskHandle, WorkerPool};
pub use scope::{Scope, ScopeReport};
pub use supervisor::{JoinOutcome, TaskSupervisor, UnitState};
pub use unit::{ProcessEndpoint, ProcessUnit, ThreadUnit, UnitBackend, UnitKind};
pub use worker::{
    run_in_process, run_in_process_timeout, serve_worker, worker_command, WORKER_SUBCOMMAND,
};
