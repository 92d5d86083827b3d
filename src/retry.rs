use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractError;

/// Floor applied to rate-limit backoff so a throttled endpoint always
/// gets at least a second of breathing room.
const RATE_LIMIT_FLOOR: Duration = Duration::from_secs(1);

/// Retry policy with full-jitter exponential backoff.
///
/// Rate-limit-class errors use a separate, shorter base/cap window: quota
/// errors clear quickly, so long waits only burn the caller's budget, but
/// the [`RATE_LIMIT_FLOOR`] keeps consecutive attempts from arriving
/// back-to-back.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial backoff delay ceiling
    pub base_delay: Duration,
    /// Backoff delay ceiling cap
    pub max_delay: Duration,
    /// Base for rate-limit-class errors
    pub rate_limit_base_delay: Duration,
    /// Cap for rate-limit-class errors
    pub rate_limit_max_delay: Duration,
}

impl RetryPolicy {
    /// General policy for extraction and refinement calls.
    pub fn general() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            rate_limit_base_delay: Duration::from_millis(500),
            rate_limit_max_delay: Duration::from_secs(10),
        }
    }

    /// General policy with attempt count and windows taken from
    /// configuration.
    pub fn from_config(config: &crate::config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            ..Self::general()
        }
    }

    /// Strict policy for the device-compiler path. Two attempts with a
    /// tight cap, composed with the hard per-call timeout, keep two
    /// sequential calls in one job inside the overall 360s budget.
    pub fn compiler() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            rate_limit_base_delay: Duration::from_secs(1),
            rate_limit_max_delay: Duration::from_secs(3),
        }
    }

    /// Ceiling for the jitter draw on a given attempt:
    /// `min(cap, base * 2^attempt)`.
    pub fn backoff_ceiling(&self, attempt: u32, rate_limited: bool) -> Duration {
        let (base, cap) = if rate_limited {
            (self.rate_limit_base_delay, self.rate_limit_max_delay)
        } else {
            (self.base_delay, self.max_delay)
        };
        let exp = base.saturating_mul(2u32.saturating_pow(attempt));
        exp.min(cap)
    }

    /// Full-jitter delay: uniform in `[0, ceiling)`, with the one second
    /// floor applied to rate-limit-class errors.
    fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let ceiling = self.backoff_ceiling(attempt, rate_limited);
        let millis = ceiling.as_millis().max(1) as u64;
        let drawn = Duration::from_millis(rand::thread_rng().gen_range(0..millis));
        if rate_limited {
            drawn.max(RATE_LIMIT_FLOOR)
        } else {
            drawn
        }
    }
}

/// Execute a failable async operation under a retry policy.
///
/// Non-retryable errors return immediately after a single invocation.
/// Retryable errors back off with full jitter; the wait races the
/// caller's cancellation token so a cancelled job never sits out a
/// queued delay. The operation must be safe to invoke more than once.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }

                if attempt + 1 == policy.max_attempts {
                    last_error = Some(error);
                    break;
                }

                let delay = policy.delay_for(attempt, error.is_rate_limited());
                warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt + 1,
                    policy.max_attempts,
                    error,
                    delay
                );
                last_error = Some(error);

                tokio::select! {
                    _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
        }
    }

    debug!("All {} attempts exhausted", policy.max_attempts);
    Err(last_error
        .unwrap_or_else(|| ExtractError::Timeout("retry loop without attempts".to_string())))
}

/// Bound a future by a hard deadline, mapping expiry to
/// [`ExtractError::Timeout`] with the given call-site label.
pub async fn with_timeout<T>(
    label: &str,
    budget: Duration,
    fut: impl Future<Output = Result<T, ExtractError>>,
) -> Result<T, ExtractError> {
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExtractError::Timeout(label.to_string())),
    }
}
