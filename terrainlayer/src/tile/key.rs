//! Tile key type.

use std::fmt;

/// Identifies a tile by level and grid position.
///
/// - `x` increases eastward from the west edge of the tiling scheme
/// - `y` increases southward from the north edge
///
/// # Example
///
/// ```
/// use terrainlayer::tile::TileKey;
///
/// let key = TileKey::new(5, 12, 7);
/// assert_eq!(key.parent(), Some(TileKey::new(4, 6, 3)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    level: u32,
    x: u32,
    y: u32,
}

impl TileKey {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// The tile one level up that covers this one, or `None` for a root tile.
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey::new(self.level - 1, self.x / 2, self.y / 2))
    }

    /// Iterates over ancestors from the parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = TileKey> {
        std::iter::successors(self.parent(), |key| key.parent())
    }

    /// The four tiles one level down, in NW, NE, SW, SE order.
    pub fn children(&self) -> [TileKey; 4] {
        let level = self.level + 1;
        let (x, y) = (self.x * 2, self.y * 2);
        [
            TileKey::new(level, x, y),
            TileKey::new(level, x + 1, y),
            TileKey::new(level, x, y + 1),
            TileKey::new(level, x + 1, y + 1),
        ]
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/{}/{}", self.level, self.x, self.y)
    }
}
