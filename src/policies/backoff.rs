//! # Backoff policy for retrying a failed sweep.
//!
//! [`BackoffPolicy`] decides how long the retention sweeper waits after a purge
//! fails before it tries again. The delay after the `n`-th consecutive failure
//! (0-indexed) is `first × factor^n`, clamped to `max`, then jittered.
//!
//! The default is a constant 60s delay with no jitter.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use flowtrail::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(10),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(10));
//! assert_eq!(backoff.next(1), Duration::from_secs(20));
//! assert_eq!(backoff.next(5), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 60s, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(60))
    }
}

impl BackoffPolicy {
    /// A policy that always waits `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `failures` consecutive failures (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_constant_sixty_seconds() {
        let policy = BackoffPolicy::default();
        for failures in 0..5 {
            assert_eq!(policy.next(failures), Duration::from_secs(60));
        }
    }

    #[test]
    fn grows_then_clamps() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(10), Duration::from_secs(1));
    }

    #[test]
    fn overflow_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..BackoffPolicy::constant(Duration::from_secs(60))
        };
        for failures in 0..20 {
            assert!(policy.next(failures) <= Duration::from_secs(60));
        }
    }
}
