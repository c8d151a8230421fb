//! Process-wide throttle for embedding requests.
//!
//! Two limits apply to every request attempt, retries included:
//! - at most `parallelism` requests in flight (semaphore)
//! - at least `min_interval` between two request starts (pacer)

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::trace;

use crate::errors::ProviderError;

/// Shared throttle; owned by the store facade and borrowed by every batch.
#[derive(Debug)]
pub struct Throttle {
    permits: Semaphore,
    min_interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(parallelism: usize, min_interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(parallelism.max(1)),
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    /// Waits for an in-flight slot and for this request's start slot.
    ///
    /// The returned permit must be held for the duration of the request.
    ///
    /// # Errors
    /// [`ProviderError::Closed`] once the throttle is closed.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, ProviderError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Closed("embedding throttle".into()))?;

        if !self.min_interval.is_zero() {
            let start_at = {
                let mut next = self.next_start.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                let at = next.map_or(now, |n| n.max(now));
                *next = Some(at + self.min_interval);
                at
            };
            trace!("throttle::acquire start in {:?}", start_at - Instant::now());
            tokio::time::sleep_until(start_at).await;
        }
        Ok(permit)
    }

    /// Rejects all current and future waiters.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FailureClass, default_classify};

    #[tokio::test(start_paused = true)]
    async fn paces_request_starts() {
        let th = Throttle::new(4, Duration::from_millis(100));
        let t0 = Instant::now();
        let mut starts = Vec::new();
        for _ in 0..3 {
            let _p = th.acquire().await.unwrap();
            starts.push(t0.elapsed());
        }
        assert_eq!(starts[0], Duration::ZERO);
        assert!(starts[1] >= Duration::from_millis(100));
        assert!(starts[2] >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn bounds_in_flight() {
        let th = Throttle::new(2, Duration::ZERO);
        let a = th.acquire().await.unwrap();
        let _b = th.acquire().await.unwrap();
        assert_eq!(th.available(), 0);
        assert!(
            tokio::time::timeout(Duration::from_secs(1), th.acquire())
                .await
                .is_err()
        );
        drop(a);
        assert!(th.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn closed_throttle_rejects_permanently() {
        let th = Throttle::new(1, Duration::ZERO);
        th.close();
        let err = th.acquire().await.unwrap_err();
        assert!(matches!(err, ProviderError::Closed(_)));
        assert_eq!(default_classify(&err), FailureClass::Permanent);
    }
}
