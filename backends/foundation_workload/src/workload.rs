use core::fmt;

use serde::{Deserialize, Serialize};

use crate::WorkloadError;

/// How many loop steps run between two polls of the cancellation predicate.
const CANCEL_POLL_STRIDE: u64 = 256;

/// The record produced by one [`compute`] call.
///
/// Fields are private: a result is built once by the workload (or decoded
/// from the pipe) and only read afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    prime_count: u64,
    largest_prime: Option<u64>,
    math_result: f64,
}

impl WorkResult {
    #[must_use]
    pub const fn new(prime_count: u64, largest_prime: Option<u64>, math_result: f64) -> Self {
        Self {
            prime_count,
            largest_prime,
            math_result,
        }
    }

    /// Number of primes in `[2, size)`.
    #[must_use]
    pub const fn prime_count(&self) -> u64 {
        self.prime_count
    }

    /// The largest prime below `size`, absent when there is none.
    #[must_use]
    pub const fn largest_prime(&self) -> Option<u64> {
        self.largest_prime
    }

    #[must_use]
    pub const fn math_result(&self) -> f64 {
        self.math_result
    }

    /// Renders the one-line summary the demos print.
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WorkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prime count={}, Largest prime=", self.prime_count)?;
        match self.largest_prime {
            Some(prime) => write!(f, "{prime}")?,
            None => write!(f, "None")?,
        }
        write!(f, ", Math result={:.2}", self.math_result)
    }
}

/// Runs the workload for `size`.
///
/// # Errors
///
/// Returns [`WorkloadError::InvalidArgument`] when `size` is negative.
/// `0` and `1` are valid and yield no primes.
///
/// # Examples
///
/// ```
/// use foundation_workload::compute;
///
/// let result = compute(10).unwrap();
/// assert_eq!(result.prime_count(), 4);
/// assert_eq!(result.largest_prime(), Some(7));
/// ```
pub fn compute(size: i64) -> Result<WorkResult, WorkloadError> {
    compute_until(size, || false)
}

/// Runs the workload for `size`, polling `is_cancelled` every few hundred
/// steps (and before the first one).
///
/// This is the cooperative stop path for thread-based execution units, which
/// cannot be killed from outside.
///
/// # Errors
///
/// Returns [`WorkloadError::InvalidArgument`] when `size` is negative and
/// [`WorkloadError::Cancelled`] once `is_cancelled` reports `true`.
#[allow(clippy::cast_precision_loss)]
pub fn compute_until<F>(size: i64, is_cancelled: F) -> Result<WorkResult, WorkloadError>
where
    F: Fn() -> bool,
{
    let Ok(limit) = u64::try_from(size) else {
        return Err(WorkloadError::InvalidArgument { size });
    };

    let mut prime_count = 0u64;
    let mut largest_prime = None;
    for (step, candidate) in (2..limit).enumerate() {
        if step as u64 % CANCEL_POLL_STRIDE == 0 && is_cancelled() {
            return Err(WorkloadError::Cancelled);
        }
        if is_prime(candidate) {
            prime_count += 1;
            largest_prime = Some(candidate);
        }
    }

    let mut math_result = 0.0_f64;
    for i in 0..limit {
        if i % CANCEL_POLL_STRIDE == 0 && is_cancelled() {
            return Err(WorkloadError::Cancelled);
        }
        let x = i as f64;
        math_result += (x + 1.0).sqrt();
        math_result += x.sin() * x.cos();
        math_result += (x + 1.0).ln();
    }

    tracing::debug!(
        size,
        prime_count,
        ?largest_prime,
        "workload completed: math result {math_result:.2}"
    );

    Ok(WorkResult::new(prime_count, largest_prime, math_result))
}

/// Trial division by every divisor up to `sqrt(candidate)`.
fn is_prime(candidate: u64) -> bool {
    let mut divisor = 2u64;
    while divisor * divisor <= candidate {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}
