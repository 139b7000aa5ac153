use std::future::Future;
use std::time::Duration;

use super::AiError;

pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub(crate) fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    /// Pause after the given 1-based failed attempt: `base * 2^attempt`.
    pub(crate) fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Runs `call` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. `call` receives the 1-based attempt number.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, AiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 1;

    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_seconds = delay.as_secs_f64(),
                    error = %err,
                    "AI call failed; retrying"
                );
                metrics::counter!("ai_retries_total", "operation" => operation).increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(operation, attempt, error = %err, "AI call failed");
                return Err(err);
            }
        }
    }
}
