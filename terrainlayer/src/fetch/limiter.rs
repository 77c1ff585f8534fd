//! In-flight request budget.
//!
//! Heightmap requests are capped by a semaphore. A request that cannot get a
//! permit immediately is not queued: the caller parks the tile and retries
//! on a later update. Permits are RAII guards that travel with the request
//! future, so every acquired permit is released exactly once no matter how
//! the request ends.
//!
//! A single limiter can be shared by several providers through `Arc` to
//! enforce one budget across all of them:
//!
//! ```
//! use std::sync::Arc;
//! use terrainlayer::fetch::RequestLimiter;
//!
//! let limiter = Arc::new(RequestLimiter::new(6, "heightmaps"));
//! let permit = limiter.try_acquire().expect("budget available");
//! assert_eq!(limiter.in_flight(), 1);
//! drop(permit);
//! assert_eq!(limiter.in_flight(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent heightmap requests.
pub const DEFAULT_MAX_REQUESTS_IN_FLIGHT: usize = 6;

/// Non-blocking request budget.
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    /// Shared with permits so they can decrement on drop.
    in_flight: Arc<AtomicUsize>,
    label: String,
}

impl RequestLimiter {
    /// Creates a limiter allowing `max_in_flight` concurrent requests.
    pub fn new(max_in_flight: usize, label: impl Into<String>) -> Self {
        let label = label.into();

        tracing::debug!(
            max_in_flight,
            label = %label,
            "Created request limiter"
        );

        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            in_flight: Arc::new(AtomicUsize::new(0)),
            label,
        }
    }

    /// Creates a limiter with the default budget of six requests.
    pub fn with_defaults(label: impl Into<String>) -> Self {
        Self::new(DEFAULT_MAX_REQUESTS_IN_FLIGHT, label)
    }

    /// Takes a permit if one is free, without waiting.
    pub fn try_acquire(&self) -> Option<RequestPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Some(RequestPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of permits that can still be acquired.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A held request slot, released on drop.
#[derive(Debug)]
pub struct RequestPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_limiter() {
        let limiter = RequestLimiter::new(6, "test");
        assert_eq!(limiter.max_in_flight(), 6);
        assert_eq!(limiter.available(), 6);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.label(), "test");
    }

    #[test]
    fn test_budget_is_enforced() {
        let limiter = RequestLimiter::with_defaults("test");
        let permits: Vec<_> = (0..6).map(|_| limiter.try_acquire()).collect();
        assert!(permits.iter().all(Option::is_some));
        assert_eq!(limiter.in_flight(), 6);

        // Seventh request is refused and does not touch the counter.
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.in_flight(), 6);
    }

    #[test]
    fn test_release_on_drop() {
        let limiter = RequestLimiter::new(2, "test");
        let a = limiter.try_acquire().unwrap();
        let b = limiter.try_acquire().unwrap();
        drop(a);
        assert_eq!(limiter.in_flight(), 1);
        assert!(limiter.try_acquire().is_some());
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn test_permits_released_across_tasks() {
        let limiter = Arc::new(RequestLimiter::new(4, "test"));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let permit = limiter.try_acquire().unwrap();
            handles.push(tokio::spawn(async move {
                tokio::task::yield_now().await;
                drop(permit);
            }));
        }
        assert!(limiter.in_flight() <= 4);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_shared_limiter_counts_all_holders() {
        let limiter = Arc::new(RequestLimiter::new(3, "shared"));
        let other = Arc::clone(&limiter);
        let _a = limiter.try_acquire().unwrap();
        let _b = other.try_acquire().unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(other.available(), 1);
    }
}
