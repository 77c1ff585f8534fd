//! Tile lifecycle states.
//!
//! ```text
//! Unloaded --advance--> Receiving --fetch ok / upsampled--> Received
//! Receiving --request budget full--> Unloaded
//! Received --advance--> Transforming --mesh ready--> Transformed
//! Received --transform postponed--> Received
//! Transformed --advance--> Ready
//! Receiving / Transforming --unrecoverable--> Failed
//! ```

use std::fmt;

/// Where a tile is in the fetch → transform → assemble pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileState {
    /// No data yet, or parked by request back-pressure.
    #[default]
    Unloaded,
    /// A fetch is in flight.
    Receiving,
    /// A heightmap is present, fetched or upsampled.
    Received,
    /// Mesh generation is in flight.
    Transforming,
    /// Mesh buffers are ready for assembly.
    Transformed,
    /// Render resources are built.
    Ready,
    /// Loading failed and cannot be recovered for this tile instance.
    Failed,
}

impl TileState {
    /// Returns true for `Ready` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TileState::Ready | TileState::Failed)
    }

    /// Returns true while an asynchronous stage owns the tile.
    pub fn is_pending(&self) -> bool {
        matches!(self, TileState::Receiving | TileState::Transforming)
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Unloaded => "unloaded",
            TileState::Receiving => "receiving",
            TileState::Received => "received",
            TileState::Transforming => "transforming",
            TileState::Transformed => "transformed",
            TileState::Ready => "ready",
            TileState::Failed => "failed",
        };
        f.write_str(name)
    }
}
