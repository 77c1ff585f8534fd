use std::sync::atomic::{AtomicU64, Ordering};

use super::MetricsSnapshot;

/// Counters for every stage of the tile pipeline.
///
/// Updated from runtime and pool threads; reads are relaxed and only
/// consistent per counter.
#[derive(Debug, Default)]
pub struct TerrainMetrics {
    requests_issued: AtomicU64,
    requests_deferred: AtomicU64,
    fetch_succeeded: AtomicU64,
    fetch_failed: AtomicU64,
    tiles_upsampled: AtomicU64,
    transforms_postponed: AtomicU64,
    transforms_completed: AtomicU64,
    transforms_failed: AtomicU64,
    tiles_ready: AtomicU64,
    tiles_failed: AtomicU64,
}

impl TerrainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// A request was refused by the in-flight budget.
    pub fn request_deferred(&self) {
        self.requests_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_succeeded(&self) {
        self.fetch_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_upsampled(&self) {
        self.tiles_upsampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transform_postponed(&self) {
        self.transforms_postponed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transform_completed(&self) {
        self.transforms_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transform_failed(&self) {
        self.transforms_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_ready(&self) {
        self.tiles_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            requests_deferred: self.requests_deferred.load(Ordering::Relaxed),
            fetch_succeeded: self.fetch_succeeded.load(Ordering::Relaxed),
            fetch_failed: self.fetch_failed.load(Ordering::Relaxed),
            tiles_upsampled: self.tiles_upsampled.load(Ordering::Relaxed),
            transforms_postponed: self.transforms_postponed.load(Ordering::Relaxed),
            transforms_completed: self.transforms_completed.load(Ordering::Relaxed),
            transforms_failed: self.transforms_failed.load(Ordering::Relaxed),
            tiles_ready: self.tiles_ready.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(TerrainMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_each_counter_is_independent() {
        let metrics = TerrainMetrics::new();
        metrics.request_issued();
        metrics.request_issued();
        metrics.request_deferred();
        metrics.fetch_failed();
        metrics.tile_upsampled();
        metrics.transform_postponed();
        metrics.tile_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_issued, 2);
        assert_eq!(snapshot.requests_deferred, 1);
        assert_eq!(snapshot.fetch_succeeded, 0);
        assert_eq!(snapshot.fetch_failed, 1);
        assert_eq!(snapshot.tiles_upsampled, 1);
        assert_eq!(snapshot.transforms_postponed, 1);
        assert_eq!(snapshot.tiles_failed, 1);
        assert_eq!(snapshot.tiles_ready, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(TerrainMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.transform_completed();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().transforms_completed, 4000);
    }
}
