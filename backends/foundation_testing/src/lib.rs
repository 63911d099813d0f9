//! Test support for the coordination crates.
//!
//! This crate provides:
//! - **Stress harness**: many threads hammering one operation, with panics
//!   counted instead of propagated
//! - **Concurrency gauge**: high-water mark of how many threads were inside
//!   a region at once
//! - **Timeline**: timestamped phase records for happens-before assertions
//! - **Criterion benchmarks** (under `benches/`)
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::{ConcurrencyGauge, StressConfig, StressHarness};
//!
//! let gauge = ConcurrencyGauge::new();
//! let config = StressConfig::new().threads(4).iterations(100);
//!
//! let result = StressHarness::new(config).run(|_thread_id, _iteration| {
//!     let _inside = gauge.enter();
//!     true
//! });
//!
//! assert_eq!(result.successes, 400);
//! assert!(gauge.high_water_mark() <= 4);
//! ```

pub mod gauge;
pub mod stress;
pub mod timeline;

pub use gauge::{ConcurrencyGauge, GaugeGuard};
pub use stress::{StressConfig, StressHarness, StressResult};
pub use timeline::{Mark, Timeline};
