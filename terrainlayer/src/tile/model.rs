//! The per-cell tile record.

use std::sync::Arc;

use crate::assemble::RenderAttributes;
use crate::codec::HeightRaster;
use crate::error::TerrainError;
use crate::geo::Extent;
use crate::mesh::TransformedGeometry;

use super::{TileKey, TileState};

/// One cell of the tiling grid and everything loaded for it so far.
///
/// The pipeline owns all mutation; callers read the tile through the
/// accessors. Geometry is shared immutably so descendants can upsample from
/// it while it stays attached to this tile.
#[derive(Debug)]
pub struct Tile {
    key: TileKey,
    /// Distinguishes this instance from earlier tiles with the same key.
    generation: u64,
    extent: Extent,
    state: TileState,
    has_real_data: bool,
    geometry: Option<Arc<HeightRaster>>,
    transformed_geometry: Option<TransformedGeometry>,
    render: Option<RenderAttributes>,
    last_error: Option<TerrainError>,
}

impl Tile {
    pub fn new(key: TileKey, extent: Extent) -> Self {
        Self {
            key,
            generation: 0,
            extent,
            state: TileState::Unloaded,
            has_real_data: false,
            geometry: None,
            transformed_geometry: None,
            render: None,
            last_error: None,
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn level(&self) -> u32 {
        self.key.level()
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    /// True only when the heightmap came from the remote source.
    pub fn has_real_data(&self) -> bool {
        self.has_real_data
    }

    /// The heightmap, present once the tile has been received.
    pub fn geometry(&self) -> Option<&Arc<HeightRaster>> {
        self.geometry.as_ref()
    }

    /// Mesh buffers waiting for assembly.
    pub fn transformed_geometry(&self) -> Option<&TransformedGeometry> {
        self.transformed_geometry.as_ref()
    }

    /// Render attributes, present once the tile is ready.
    pub fn render(&self) -> Option<&RenderAttributes> {
        self.render.as_ref()
    }

    /// The error that moved the tile to `Failed`, or the recovered fetch error.
    pub fn last_error(&self) -> Option<&TerrainError> {
        self.last_error.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == TileState::Ready
    }

    pub(crate) fn set_state(&mut self, state: TileState) {
        self.state = state;
    }

    /// Stores a fetched heightmap.
    pub(crate) fn set_real_geometry(&mut self, raster: HeightRaster) {
        self.geometry = Some(Arc::new(raster));
        self.has_real_data = true;
        self.state = TileState::Received;
    }

    /// Stores a heightmap synthesized from an ancestor.
    pub(crate) fn set_upsampled_geometry(&mut self, raster: HeightRaster) {
        debug_assert!(!self.has_real_data, "upsampled over real data");
        self.geometry = Some(Arc::new(raster));
        self.state = TileState::Received;
    }

    pub(crate) fn set_transformed_geometry(&mut self, transformed: TransformedGeometry) {
        self.transformed_geometry = Some(transformed);
        self.state = TileState::Transformed;
    }

    pub(crate) fn take_transformed_geometry(&mut self) -> Option<TransformedGeometry> {
        self.transformed_geometry.take()
    }

    pub(crate) fn set_render(&mut self, render: RenderAttributes) {
        self.render = Some(render);
        self.state = TileState::Ready;
    }

    pub(crate) fn record_error(&mut self, error: TerrainError) {
        self.last_error = Some(error);
    }

    pub(crate) fn fail(&mut self, error: TerrainError) {
        self.last_error = Some(error);
        self.state = TileState::Failed;
    }
}
