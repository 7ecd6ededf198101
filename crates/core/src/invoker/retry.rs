//! How failed model calls are retried.

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

/// Retry policy for model invocations.
///
/// Only transient failures are retried. The delay between two attempts grows
/// exponentially from `initial_interval` up to `max_interval`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    ///
    /// `None` retries forever, which is only reasonable when an operator
    /// can cancel the run.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of the delay between two attempts.
    pub max_interval: Duration,
    /// Growth factor of the delay.
    pub multiplier: f64,
    /// How long a single attempt may take before it counts as failed.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            attempt_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that never gives up on transient failures.
    #[inline]
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Default::default()
        }
    }

    /// Sets the maximum number of attempts.
    #[inline]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial and maximum delay between attempts.
    #[inline]
    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max.max(initial);
        self
    }

    /// Sets the growth factor of the delay.
    #[inline]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the per-attempt timeout.
    #[inline]
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns `true` if the 1-based `attempt` may be made.
    #[inline]
    pub(crate) fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }
}
