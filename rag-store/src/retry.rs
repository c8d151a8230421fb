//! Explicit retry policy and the generic executor that consumes it.
//!
//! The policy decides *whether* to retry ([`RetryPolicy::classify`]) and *how long*
//! to wait (exponential backoff, capped, never shorter than a server `retry_after`).
//! Call sites only describe the operation.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EmbedConfig;
use crate::errors::{FailureClass, ProviderError, default_classify};

/// Retry policy value object.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one (>= 1).
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubled for each further attempt.
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub classify: fn(&ProviderError) -> FailureClass,
}

impl RetryPolicy {
    pub fn from_config(cfg: &EmbedConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: cfg.backoff_base,
            backoff_cap: cfg.backoff_cap,
            classify: default_classify,
        }
    }

    /// Delay before attempt `failed + 1`, where `failed` attempts already failed.
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(20);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_cap)
    }
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// together with its classification.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, (ProviderError, FailureClass)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(v) => {
                if attempt > 1 {
                    debug!("retry::{label} succeeded on attempt {attempt}");
                }
                return Ok(v);
            }
            Err(err) => {
                let class = (policy.classify)(&err);
                if class == FailureClass::Permanent || attempt >= policy.max_attempts {
                    warn!(
                        "retry::{label} giving up after {attempt} attempt(s) ({class:?}): {err}"
                    );
                    return Err((err, class));
                }
                let delay = policy
                    .backoff(attempt)
                    .max(err.retry_after().unwrap_or_default());
                warn!(
                    "retry::{label} attempt {attempt}/{} failed: {err}; retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max,
            backoff_base: Duration::from_millis(100),
            backoff_cap: Duration::from_millis(800),
            classify: default_classify,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(10);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(4), Duration::from_millis(800));
        assert_eq!(p.backoff(9), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success() {
        let calls = AtomicU32::new(0);
        let out = retry_with_policy(&policy(4), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Connection("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(out.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_with_policy(&policy(4), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Auth("401".into())) }
        })
        .await;
        let (_, class) = out.unwrap_err();
        assert_eq!(class, FailureClass::Permanent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_with_policy(&policy(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Timeout(Duration::from_secs(1))) }
        })
        .await;
        let (_, class) = out.unwrap_err();
        assert_eq!(class, FailureClass::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn honours_retry_after() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);
        let _ = retry_with_policy(&policy(2), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::RateLimited {
                        retry_after: Some(Duration::from_secs(2)),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
