use std::fmt;

/// Point-in-time copy of [`TerrainMetrics`](super::TerrainMetrics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_issued: u64,
    pub requests_deferred: u64,
    pub fetch_succeeded: u64,
    pub fetch_failed: u64,
    pub tiles_upsampled: u64,
    pub transforms_postponed: u64,
    pub transforms_completed: u64,
    pub transforms_failed: u64,
    pub tiles_ready: u64,
    pub tiles_failed: u64,
}

impl MetricsSnapshot {
    /// Requests sent whose response has not been applied yet.
    pub fn requests_pending(&self) -> u64 {
        self.requests_issued
            .saturating_sub(self.fetch_succeeded + self.fetch_failed)
    }

    /// Fraction of finished requests that returned usable data.
    pub fn fetch_success_rate(&self) -> f64 {
        let finished = self.fetch_succeeded + self.fetch_failed;
        if finished == 0 {
            return 1.0;
        }
        self.fetch_succeeded as f64 / finished as f64
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests {} (deferred {}, ok {}, failed {}), upsampled {}, \
             transforms {} (postponed {}, failed {}), ready {}, failed {}",
            self.requests_issued,
            self.requests_deferred,
            self.fetch_succeeded,
            self.fetch_failed,
            self.tiles_upsampled,
            self.transforms_completed,
            self.transforms_postponed,
            self.transforms_failed,
            self.tiles_ready,
            self.tiles_failed,
        )
    }
}
