//! Pipeline telemetry.
//!
//! Lock-free atomic counters recorded at each stage transition, and a
//! point-in-time snapshot for display or assertions.
//!
//! ```text
//! TerrainProvider ─────► TerrainMetrics ─────► MetricsSnapshot
//!                        (atomic counters)     (plain copy)
//! ```
//!
//! # Example
//!
//! ```
//! use terrainlayer::telemetry::TerrainMetrics;
//!
//! let metrics = TerrainMetrics::new();
//! metrics.request_issued();
//! metrics.fetch_succeeded();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.requests_issued, 1);
//! assert_eq!(snapshot.requests_pending(), 0);
//! ```

mod metrics;
mod snapshot;

pub use metrics::TerrainMetrics;
pub use snapshot::MetricsSnapshot;
