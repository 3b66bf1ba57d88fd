//! Concurrency limiter: a counting admission gate.
//!
//! Wraps a tokio [`Semaphore`], which admits waiters in FIFO order, and
//! tracks how many permits are out and the highest that number reached.
//! A slot is released when its [`Permit`] drops, so every exit path of a
//! task (return, error, cancellation, panic unwind) gives it back once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::error::{Error, Result};
use crate::telemetry::metrics;

#[derive(Debug)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Caps the number of simultaneously admitted tasks.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    gauge: Arc<Gauge>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `capacity` tasks at a time.
    ///
    /// A capacity of zero would never admit anything and is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(Error::Config(format!(
                "max concurrency {capacity} exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            gauge: Arc::new(Gauge {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
            capacity,
        })
    }

    /// Wait until fewer than `capacity` tasks are admitted, then admit.
    pub async fn acquire(&self) -> Result<Permit> {
        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::limiter_waits().add(1, &[]);
                trace!(capacity = self.capacity, "waiting for admission");
                Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::LimiterClosed)?
            }
        };

        let active = self.gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(active, Ordering::SeqCst);

        Ok(Permit {
            _permit: permit,
            gauge: Arc::clone(&self.gauge),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn active(&self) -> usize {
        self.gauge.active.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at once since creation.
    pub fn peak(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }
}

/// An admitted slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    gauge: Arc<Gauge>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        // Decrement before the semaphore permit is returned, so `active`
        // never overshoots the capacity.
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_a_config_error() {
        assert!(matches!(ConcurrencyLimiter::new(0), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.active(), 2);

        drop(a);
        assert_eq!(limiter.active(), 1);
        drop(b);
        assert_eq!(limiter.active(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn acquire_blocks_at_capacity() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let held = limiter.acquire().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(blocked.is_err(), "second acquire should wait");

        drop(held);
        let admitted = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(admitted.is_ok(), "slot should be free after release");
    }
}
