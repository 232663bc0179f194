use std::future::Future;
use std::time::Duration;

use super::ProviderError;

/// Retries after the first attempt; with a 1s base the delays are 1s, 2s, 4s.
pub const MAX_RETRIES: u32 = 3;

/// Exponential backoff around provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        operation,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if retry > 0 {
                        tracing::error!(operation, attempts = retry + 1, error = %e, "Provider call gave up");
                    }
                    return Err(e);
                }
            }
        }
    }
}
