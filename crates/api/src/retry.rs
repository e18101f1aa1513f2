//! Exponential backoff for submission.

use std::thread;
use std::time::{Duration, Instant};

use cromwell_util::redact_sensitive;
use tracing::warn;

/// Backoff schedule bounded by total elapsed time rather than attempt count.
///
/// The wait before attempt `n + 1` is `initial_interval * multiplier^n`,
/// capped at `max_interval`. Once `max_elapsed` has passed since the first
/// attempt, or the next wait would cross it, the last error is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_elapsed: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Wait before the attempt following `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }

    /// Run `operation` until it succeeds or the elapsed budget runs out.
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let delay = self.backoff(attempt);
                    if started.elapsed() + delay > self.max_elapsed {
                        return Err(error);
                    }
                    warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %redact_sensitive(&error.to_string()), "retrying after failure");
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            multiplier: 2.0,
            max_interval: Duration::from_millis(4),
            max_elapsed: Duration::from_secs(5),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(200), Duration::from_secs(10));
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result: Result<&str, String> = fast_policy().run(|| {
            calls += 1;
            if calls < 3 { Err(format!("attempt {calls}")) } else { Ok("done") }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[test]
    fn returns_last_error_once_budget_is_spent() {
        let policy = RetryPolicy {
            max_elapsed: Duration::from_millis(20),
            ..fast_policy()
        };
        let mut calls = 0;
        let result: Result<(), String> = policy.run(|| {
            calls += 1;
            Err(format!("attempt {calls}"))
        });
        assert_eq!(result.unwrap_err(), format!("attempt {calls}"));
        assert!(calls > 1);
    }

    #[test]
    fn no_retry_runs_once() {
        let mut calls = 0;
        let result: Result<(), &str> = RetryPolicy::no_retry().run(|| {
            calls += 1;
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
