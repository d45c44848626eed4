use std::future::Future;
use std::time::Duration;

use futures::stream::BoxStream;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{RetryClass, Runnable, Settings, StreamEvent, TripvarError};

/// Extra attempts granted to [`RetryClass::Limited`] failures within one call.
pub const DEFAULT_LIMITED_RETRIES: usize = 1;

/// Bounded exponential backoff: `base_delay * 2^(attempt-1)`, capped at `max_delay`.
///
/// Once attempts run out the last error is returned as-is, so callers see the
/// real failure rather than a wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    limited_retries: usize,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: base_delay.saturating_mul(10),
            limited_retries: DEFAULT_LIMITED_RETRIES,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.max_retries(), settings.retry_base_delay())
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_limited_retries(mut self, limited_retries: usize) -> Self {
        self.limited_retries = limited_retries;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 2u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn execute<F, Fut, T>(&self, mut call: F) -> Result<T, TripvarError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TripvarError>>,
    {
        let mut attempt = 0;
        let mut limited_used = 0;

        loop {
            attempt += 1;

            let error = match call().await {
                Ok(output) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(error) => error,
            };

            let class = error.retry_class();
            let allowed = match class {
                RetryClass::Fatal => false,
                RetryClass::Transient => true,
                RetryClass::Limited => limited_used < self.limited_retries,
            };
            if !allowed {
                debug!(attempt, error = %error, "error is not retryable");
                return Err(error);
            }
            if attempt >= self.max_attempts {
                warn!(attempt, error = %error, "all retry attempts exhausted");
                return Err(error);
            }
            if class == RetryClass::Limited {
                limited_used += 1;
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after transient failure"
            );
            sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

pub struct Retrying<R> {
    runnable: R,
    policy: RetryPolicy,
}

impl<R> Retrying<R> {
    pub fn new(runnable: R, policy: RetryPolicy) -> Self {
        Self { runnable, policy }
    }
}

#[async_trait::async_trait]
impl<Input, Output, R> Runnable<Input, Output> for Retrying<R>
where
    Input: Send + Sync + Clone + 'static,
    Output: Send + 'static,
    R: Runnable<Input, Output> + Send + Sync,
{
    async fn invoke(&self, input: Input) -> Result<Output, TripvarError> {
        self.policy
            .execute(|| self.runnable.invoke(input.clone()))
            .await
    }

    fn stream(&self, input: Input) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        self.runnable.stream(input)
    }
}
