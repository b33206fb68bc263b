//! Tile coordinate math: containment across zoom levels, zoom factors and
//! window displacement.
//!
//! A source tile at zoom `z` contributes to a requested tile at zoom `Z >= z`
//! only if it is the ancestor of the request in the tile pyramid, tested by
//! right-shifting the request's x/y by the zoom delta.

/// Tile coordinates: zoom, x, and y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Canonical coordinate units per tile edge (MVT default extent).
pub const TILE_SIZE: i64 = 4096;

/// Check whether `tile` is the ancestor of (or equal to) `target` in the
/// tile pyramid.
///
/// A tile at a lower zoom covers `target` exactly when the target's x and y,
/// shifted down by the zoom delta, equal the tile's x and y.
pub fn within_target(tile: TileCoord, target: TileCoord) -> bool {
    if tile.z > target.z {
        return false;
    }
    let delta = target.z - tile.z;
    if delta >= u32::BITS {
        // Shifting a u32 down by >= 32 is logically zero: only the root
        // tile's column/row can still match.
        return tile.x == 0 && tile.y == 0;
    }
    (target.x >> delta) == tile.x && (target.y >> delta) == tile.y
}

/// Scale multiplier between a source tile's zoom and the target zoom.
///
/// Always >= 1; a factor of 1 means the source tile is already at the
/// target zoom. Returns `None` when the zoom delta is too large for the
/// factor to be representable.
pub fn zoom_factor(tile_z: u32, target_z: u32) -> Option<u32> {
    debug_assert!(tile_z <= target_z);
    1u32.checked_shl(target_z - tile_z)
}

/// Pixel offset of the requested window inside the scaled ancestor tile.
///
/// The target occupies a `1/factor` fraction of the ancestor's scaled
/// coordinate space, positioned by where its x/y fall modulo the factor.
pub fn displacement(factor: u32, tile_size: i64, target: TileCoord) -> (i64, i64) {
    let f = factor as i64;
    let dx = (target.x as i64 % f) * tile_size;
    let dy = (target.y as i64 % f) * tile_size;
    (dx, dy)
}
