//! Retry policy for failed page fetches and downloads.

use std::time::Duration;

use crate::utils::config::RetryConsts;

/// How often and how patiently a failed job is retried.
///
/// Failed jobs are requeued at the back of their queue after [`Self::delay_for`] has passed.
/// `max_attempts: None` retries forever, so a job is never dropped on failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed per job, or `None` for unlimited.
    pub max_attempts: Option<u32>,
    /// Delay after the first failure; doubles with each further failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Minimum delay after an HTTP 429.
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: RetryConsts::BASE_DELAY,
            max_delay: RetryConsts::MAX_DELAY,
            rate_limit_delay: RetryConsts::RATE_LIMIT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Unlimited attempts with no delay.
    pub const fn immediate() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether a job that has failed `failures` times may be tried again.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }

    /// Delay before requeueing a job that has failed `failures` times (1-based).
    pub fn delay_for(&self, failures: u32, rate_limited: bool) -> Duration {
        let doublings = failures.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay);
        if rate_limited {
            delay.max(self.rate_limit_delay)
        } else {
            delay
        }
    }
}
