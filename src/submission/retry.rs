use std::time::Duration;

use crate::config::PipelineConfig;

/// Linear backoff with a hard cap on automatic retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub retry_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_attempts: u32, base_delay: Duration) -> Self {
        Self {
            retry_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Whether another retry may follow `retry_count` retries already made
    pub fn can_retry(&self, retry_count: u32) -> bool {
        retry_count < self.retry_attempts
    }

    /// Delay before retry number `retry` (1-based): `base_delay * retry`
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
