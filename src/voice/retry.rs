//! Retry and timeout policy for remote synthesis requests

use std::time::Duration;

/// Retry policy for synthesis requests
///
/// A failed request is retried up to `max_retries` more times, waiting
/// `base_delay * retry_number` before each retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Delay unit, multiplied by the retry number
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Compute the delay before retry number `retry` (1-based).
///
/// Grows with the retry number: `min(base_delay * retry, max_delay)`.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, retry: u32) -> Duration {
    policy
        .base_delay
        .saturating_mul(retry.max(1))
        .min(policy.max_delay)
}

/// Per-request timeout scaled to the chunk length
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    /// Lower bound for any request
    pub min: Duration,
    /// Additional allowance per character of text
    pub per_char: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(20_000),
            per_char: Duration::from_millis(200),
        }
    }
}

impl TimeoutPolicy {
    /// `max(min, per_char * chars(text))`
    #[must_use]
    pub fn for_text(&self, text: &str) -> Duration {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        self.per_char.saturating_mul(chars).max(self.min)
    }
}
