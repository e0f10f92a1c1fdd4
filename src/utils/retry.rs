//! Exponential backoff for calls to remote providers.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff schedule: `initial_delay`, doubled after every retry, never above
/// `max_delay`. `max_attempts` counts the first call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Pause before retry number `retry` (1-based), jitter included.
    fn delay_for(&self, retry: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
            .min(self.max_delay);
        (base + jitter(base / 4)).min(self.max_delay)
    }
}

/// Errors that may succeed when the same call is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. The last error is returned.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        if attempt >= config.max_attempts {
            debug!(attempts = attempt, error = %error, "retries exhausted");
            return Err(error);
        }

        let pause = config.delay_for(attempt);
        warn!(
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = pause.as_millis() as u64,
            error = %error,
            "transient failure, retrying"
        );
        sleep(pause).await;
        attempt += 1;
    }
}

/// Up to `max` of clock-derived jitter so concurrent windows don't retry in
/// lockstep.
fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(nanos % max_ms)
}
