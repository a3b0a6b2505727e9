//! Text backend contract and bounded retry with linear backoff.
//!
//! # Architecture
//!
//! - [`TextBackend`]: core trait for a generative text call
//! - [`RetryBackend`]: decorator that retries transient failures
//!
//! # Retry Strategy
//!
//! - Only [`BackendError::Overloaded`] is retried; permanent errors return at once
//! - At most `max_retries` retries after the first call (3 by default)
//! - Linear backoff: `base_delay × retry_index` (5s, 10s, 15s by default)

use crate::error::BackendError;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// A generative text backend.
///
/// Implementors send one prompt and return the raw model text, classifying
/// failures as transient or permanent.
pub trait TextBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Retry bound and delay step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }
}

/// Wrapper that adds bounded linear-backoff retries to any [`TextBackend`].
pub struct RetryBackend<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryBackend<T>
where
    T: TextBackend,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetryBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBackend")
            .field("max_retries", &self.policy.max_retries)
            .field("base_delay", &self.policy.base_delay)
            .finish()
    }
}

impl<T> TextBackend for RetryBackend<T>
where
    T: TextBackend,
{
    #[instrument(level = "info", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let total_t0 = Instant::now();
        let mut retry = 0u32;

        loop {
            let attempt_t0 = Instant::now();
            let e = match self.inner.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !e.is_transient() {
                return Err(e);
            }

            retry += 1;
            if retry > self.policy.max_retries {
                error!(
                    retries = self.policy.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %e,
                    "generate() exhausted retries"
                );
                return Err(e);
            }

            let delay = self.policy.delay_for(retry);
            warn!(
                retry,
                max = self.policy.max_retries,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                ?delay,
                error = %e,
                "Backend overloaded; backing off"
            );
            sleep(delay).await;
        }
    }
}
