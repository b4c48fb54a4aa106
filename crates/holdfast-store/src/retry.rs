//! Bounded retries for transient backend failures.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::BackendError;

/// Retry policy for backend operations: a bounded attempt count with
/// exponential delay between attempts.
///
/// Permanent errors (`NotFound`) surface immediately; only transient errors
/// consume attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (0-indexed; attempt 0 has no delay).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(30);
        let delay = self.initial_delay.saturating_mul(1 << exp);
        delay.min(self.max_delay)
    }

    /// Run `op`, retrying transient failures up to the attempt budget.
    ///
    /// # Errors
    /// Returns the last error once the budget is spent, or the first
    /// permanent error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 0..attempts {
            let delay = self.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    debug!(attempt, error = %err, "transient backend error, retrying");
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable with attempts >= 1; the loop always returns.
        Err(last.unwrap_or_else(|| BackendError::Io("retry budget exhausted".into())))
    }
}
