use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting limiter over outstanding provider requests.
///
/// Waiters are served in FIFO order. A slot is held by the returned
/// [`Permit`] and released when it drops, whichever way the work ends.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// A held slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub const DEFAULT: usize = 2;

    /// `max` below 1 is clamped to 1.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub async fn acquire(&self) -> anyhow::Result<Permit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("Concurrency limiter semaphore closed"))?;
        Ok(Permit { _permit: permit })
    }

    /// Run `work` while holding a slot.
    pub async fn run<F, T>(&self, work: F) -> anyhow::Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(work.await)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}
