//! Error types for the terrain tile pipeline.
//!
//! Errors never escape the asynchronous stages as panics. A failed stage
//! records its error on the tile and moves the tile to `FAILED`, or routes
//! it to the ancestor upsampler when the failure is recoverable.

use thiserror::Error;

use crate::codec::CodecError;
use crate::tile::TileKey;

/// Result type for pipeline operations.
pub type TerrainResult<T> = Result<T, TerrainError>;

/// Errors that can occur while loading a terrain tile.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainError {
    /// The request could not be sent or its body could not be read.
    #[error("Request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response body is not a decodable image.
    #[error("Failed to decode heightmap image: {0}")]
    ImageDecode(String),

    /// The remote source does not serve this level.
    #[error("Level {level} exceeds maximum served level {max_level}")]
    LevelUnsupported { level: u32, max_level: u32 },

    /// No ancestor of the tile holds real height data to upsample from.
    #[error("No ancestor of tile {0} holds real height data")]
    NoAncestorData(TileKey),

    /// The offloaded mesh computation reported an error.
    #[error("Geometry transform failed: {0}")]
    Transform(String),

    /// The key names no cell of the tiling grid.
    #[error("Tile {0} lies outside the tiling grid")]
    OutsideGrid(TileKey),

    /// A stage expected geometry that the tile does not have.
    #[error("Tile {0} has no geometry for this stage")]
    MissingGeometry(TileKey),

    /// The heightmap raster is malformed.
    #[error("Invalid heightmap raster: {0}")]
    InvalidRaster(#[from] CodecError),
}

impl TerrainError {
    /// Returns true if the failure can be recovered by upsampling an ancestor.
    ///
    /// Network, status, decode and unsupported-level failures all mean the
    /// remote source has no usable data for this tile.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TerrainError::Network { .. }
                | TerrainError::HttpStatus { .. }
                | TerrainError::ImageDecode(_)
                | TerrainError::LevelUnsupported { .. }
                | TerrainError::InvalidRaster(_)
        )
    }
}
