//! Retry policies and the executor that applies them to a partner call.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::PartnerError;

/// Decides whether a failed call is re-attempted and how long to wait first.
///
/// `attempt` is 1 for the first retry.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: u32) -> bool;

    fn back_off_time(&self, attempt: u32) -> Duration;
}

fn validate_max_retries(max_retries: i64) -> Result<u32, PartnerError> {
    if max_retries <= 0 {
        return Err(PartnerError::invalid_argument(format!(
            "max retries must be greater than zero, got {max_retries}"
        )));
    }
    u32::try_from(max_retries).map_err(|_| {
        PartnerError::invalid_argument(format!("max retries {max_retries} is out of range"))
    })
}

/// Waits `(2^attempt - 1) / 2` seconds before each retry.
#[derive(Debug, Clone)]
pub struct ExponentialBackOffRetryPolicy {
    max_retries: u32,
}

impl ExponentialBackOffRetryPolicy {
    pub fn new(max_retries: i64) -> Result<Self, PartnerError> {
        Ok(Self {
            max_retries: validate_max_retries(max_retries)?,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Rejects non-positive values and keeps the previous setting.
    pub fn set_max_retries(&mut self, max_retries: i64) -> Result<(), PartnerError> {
        self.max_retries = validate_max_retries(max_retries)?;
        Ok(())
    }
}

impl Default for ExponentialBackOffRetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy for ExponentialBackOffRetryPolicy {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    fn back_off_time(&self, attempt: u32) -> Duration {
        let half_seconds = 2u64.saturating_pow(attempt).saturating_sub(1);
        Duration::from_millis(half_seconds.saturating_mul(500))
    }
}

/// Waits the same configured delay before every retry.
#[derive(Debug, Clone)]
pub struct LinearBackOffRetryPolicy {
    max_retries: u32,
    back_off: Duration,
}

impl LinearBackOffRetryPolicy {
    pub fn new(max_retries: i64, back_off: Duration) -> Result<Self, PartnerError> {
        Ok(Self {
            max_retries: validate_max_retries(max_retries)?,
            back_off,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn set_max_retries(&mut self, max_retries: i64) -> Result<(), PartnerError> {
        self.max_retries = validate_max_retries(max_retries)?;
        Ok(())
    }
}

impl Default for LinearBackOffRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            back_off: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy for LinearBackOffRetryPolicy {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    fn back_off_time(&self, _attempt: u32) -> Duration {
        self.back_off
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy gives up. A server-provided `Retry-After` overrides the policy
/// backoff. Attempts are strictly sequential.
pub async fn execute_with_retry<T, F, Fut>(
    policy: Option<&dyn RetryPolicy>,
    cancel: Option<&CancellationToken>,
    mut operation: F,
) -> Result<T, PartnerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PartnerError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(policy) = policy else {
            return Err(err);
        };
        if !err.is_retryable() {
            return Err(err);
        }
        attempt += 1;
        if !policy.should_retry(attempt) {
            return Err(err);
        }

        let delay = err
            .retry_after()
            .unwrap_or_else(|| policy.back_off_time(attempt));
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            category = ?err.category(),
            "retrying partner service call"
        );
        sleep_or_cancel(delay, cancel).await?;
    }
}

async fn sleep_or_cancel(
    delay: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), PartnerError> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(PartnerError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
