use crate::codec::HeightRaster;
use crate::error::TerrainResult;
use crate::mesh::TransformedGeometry;
use crate::tile::TileKey;

/// Result of an asynchronous stage, waiting to be applied to its tile.
///
/// `generation` identifies the tile instance the work was started for; a
/// tile re-inserted under the same key does not accept it.
#[derive(Debug)]
pub enum Completion {
    Fetched {
        key: TileKey,
        generation: u64,
        result: TerrainResult<HeightRaster>,
    },
    Transformed {
        key: TileKey,
        generation: u64,
        result: TerrainResult<TransformedGeometry>,
    },
}

impl Completion {
    pub fn key(&self) -> TileKey {
        match self {
            Completion::Fetched { key, .. } | Completion::Transformed { key, .. } => *key,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Completion::Fetched { generation, .. } | Completion::Transformed { generation, .. } => {
                *generation
            }
        }
    }
}
