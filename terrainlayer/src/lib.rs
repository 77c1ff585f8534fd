//! TerrainLayer - Heightmap terrain tiles for globe rendering
//!
//! This library fetches quantized, image-encoded heightmap tiles from a
//! remote tile server and turns them into renderable surface meshes for the
//! cells of a geographic tiling grid. When a tile's data is missing the
//! heights are synthesized from the nearest ancestor that has real data.
//!
//! # Pipeline
//!
//! ```text
//! UNLOADED ──fetch──► RECEIVED ──transform──► TRANSFORMED ──assemble──► READY
//!    ▲    (async, 6 max)    │    (rayon, may postpone)          (sync, GPU)
//!    └──── back-pressure ───┘
//!             │ failure
//!             ▼
//!        ancestor upsample ──► RECEIVED  (or FAILED when no ancestor has data)
//! ```
//!
//! The [`provider::TerrainProvider`] drives tiles stored in a caller-owned
//! [`tile::TileTree`]; every call to `advance` moves a tile one stage forward
//! and asynchronous results are applied by `process_completions`.

pub mod assemble;
pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod logging;
pub mod mesh;
pub mod provider;
pub mod telemetry;
pub mod tile;
pub mod upsample;

pub use assemble::{RenderAttributes, RenderContext, VertexArrayHandle};
pub use config::{ConfigError, TerrainConfig};
pub use error::{TerrainError, TerrainResult};
pub use provider::TerrainProvider;
pub use tile::{Tile, TileKey, TileState, TileTree};
