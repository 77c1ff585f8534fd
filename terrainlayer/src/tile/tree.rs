//! Arena of tiles keyed by position.
//!
//! Tiles refer to their parents by key, not by pointer. Walking up the tree
//! is a sequence of lookups, so evicting a tile never leaves a dangling
//! reference behind.

use std::collections::HashMap;

use crate::geo::GeographicTilingScheme;

use super::{Tile, TileKey};

/// Caller-owned collection of tiles.
#[derive(Debug)]
pub struct TileTree {
    tiling_scheme: GeographicTilingScheme,
    tiles: HashMap<TileKey, Tile>,
    next_generation: u64,
}

impl TileTree {
    pub fn new(tiling_scheme: GeographicTilingScheme) -> Self {
        Self {
            tiling_scheme,
            tiles: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn tiling_scheme(&self) -> &GeographicTilingScheme {
        &self.tiling_scheme
    }

    /// Returns the tile for `key`, creating an unloaded one if needed.
    ///
    /// Each created tile gets a generation no earlier tile in this tree had,
    /// so results started for an evicted tile never match its replacement.
    pub fn insert(&mut self, key: TileKey) -> &mut Tile {
        let scheme = &self.tiling_scheme;
        let next_generation = &mut self.next_generation;
        self.tiles.entry(key).or_insert_with(|| {
            *next_generation += 1;
            Tile::new(key, scheme.tile_to_extent(key)).with_generation(*next_generation)
        })
    }

    /// Inserts `key` and every missing ancestor up to the root.
    pub fn insert_with_ancestors(&mut self, key: TileKey) -> &mut Tile {
        for ancestor in key.ancestors() {
            self.insert(ancestor);
        }
        self.insert(key)
    }

    pub fn get(&self, key: TileKey) -> Option<&Tile> {
        self.tiles.get(&key)
    }

    pub fn get_mut(&mut self, key: TileKey) -> Option<&mut Tile> {
        self.tiles.get_mut(&key)
    }

    /// Evicts a tile. Pending results for it are discarded on arrival.
    pub fn remove(&mut self, key: TileKey) -> Option<Tile> {
        self.tiles.remove(&key)
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.tiles.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Finds the closest ancestor whose heightmap came from the remote source.
    ///
    /// Ancestors missing from the arena are skipped.
    pub fn nearest_real_data_ancestor(&self, key: TileKey) -> Option<&Tile> {
        key.ancestors()
            .filter_map(|ancestor| self.tiles.get(&ancestor))
            .find(|tile| tile.has_real_data() && tile.geometry().is_some())
    }
}

impl Default for TileTree {
    fn default() -> Self {
        Self::new(GeographicTilingScheme::default())
    }
}
