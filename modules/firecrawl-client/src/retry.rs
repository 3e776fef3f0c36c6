// Classification and retry around single provider calls.
//
// `call_provider` only classifies and logs. Retrying is opt-in through
// `with_retry`, and only rate-limited failures are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::Result;

/// Run one provider call, logging the failure class under `name`.
pub async fn call_provider<T, F, Fut>(name: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let result = action().await;
    if let Err(ref err) = result {
        if err.is_rate_limited() {
            warn!(call = name, error = %err, "Provider rate limited");
        } else if err.is_insufficient_credits() {
            error!(call = name, error = %err, "Provider credits exhausted");
        } else {
            debug!(call = name, error = %err, "Provider call failed");
        }
    }
    result
}

/// Backoff schedule for rate-limited calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter applied to every delay, e.g. 0.1 for ±10%.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Map / crawl start: 2s doubling up to 60s, ±10%, six retries.
    pub fn discovery() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }

    /// Per-URL scrape: 1s doubling up to 32s, ±20%, five retries.
    pub fn scrape() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            jitter: 0.2,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Un-jittered exponential delay for a zero-based attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

fn apply_jitter(delay: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || delay.is_zero() {
        return delay;
    }
    let factor = 1.0 + rand::rng().random_range(-fraction..=fraction);
    delay.mul_f64(factor.max(0.0))
}

/// Retry `action` while it fails with a rate-limit error, up to `policy.max_retries`.
/// The provider's own retry hint is preferred over the computed backoff.
pub async fn with_retry<T, F, Fut>(name: &str, policy: &RetryPolicy, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call_provider(name, &mut action).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempt < policy.max_retries => {
                let wait = err
                    .retry_after()
                    .unwrap_or_else(|| policy.backoff(attempt));
                let wait = apply_jitter(wait, policy.jitter);
                warn!(
                    call = name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_retries + 1,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_rate_limited() {
                    error!(call = name, attempts = attempt + 1, "Rate limited after all retries");
                }
                return Err(err);
            }
        }
    }
}
