//! Tile identity, state and storage.
//!
//! - [`TileKey`] names a cell of the tiling grid
//! - [`TileState`] tracks how far the cell has been loaded
//! - [`Tile`] holds the loaded data
//! - [`TileTree`] is the arena that owns tiles and resolves parents by key

mod key;
mod model;
mod state;
mod tree;

pub use key::TileKey;
pub use model::Tile;
pub use state::TileState;
pub use tree::TileTree;
