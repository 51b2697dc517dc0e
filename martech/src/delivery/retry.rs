use std::time::Duration;

use config::shared::RetryConfig;
use rand::Rng;

use crate::error::MartechError;

/// Predicate deciding whether a failed attempt may be retried.
pub type RetryablePredicate = fn(&MartechError) -> bool;

/// Default predicate: retries transient errors only.
pub fn is_retryable(error: &MartechError) -> bool {
    error.kind().is_transient()
}

/// Exponential backoff settings of the delivery client.
///
/// Stateless: attempt numbers are passed in by the caller, so one policy serves any number of
/// concurrent calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_ratio: f64,
    retryable: RetryablePredicate,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            backoff_multiplier,
            jitter_ratio: 0.0,
            retryable: is_retryable,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_delay(),
            config.max_delay(),
            config.backoff_multiplier,
        )
        .with_jitter(config.jitter_ratio)
    }

    /// Makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0)
    }

    pub fn with_jitter(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.max(0.0);
        self
    }

    pub fn with_retryable(mut self, retryable: RetryablePredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns `true` when the kind of `error` allows retrying at all.
    pub fn is_retryable(&self, error: &MartechError) -> bool {
        (self.retryable)(error)
    }

    /// Returns `true` when `error`, raised by attempt number `attempt` (1-indexed), may be
    /// followed by another attempt.
    pub fn should_retry(&self, error: &MartechError, attempt: u32) -> bool {
        attempt < self.max_attempts && self.is_retryable(error)
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    ///
    /// `initial_delay * multiplier^(attempt - 1)` capped at `max_delay`, plus up to
    /// `jitter_ratio` of random extra delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_multiplier.powi(exponent);
        let base_delay_ms = self.initial_delay.as_millis() as f64 * multiplier;

        let capped_delay_ms = base_delay_ms.min(self.max_delay.as_millis() as f64);

        let jitter_factor = if self.jitter_ratio > 0.0 {
            rand::thread_rng().gen_range(0.0..1.0) * self.jitter_ratio
        } else {
            0.0
        };
        let jittered_delay_ms = capped_delay_ms * (1.0 + jitter_factor);

        Duration::from_millis(jittered_delay_ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
