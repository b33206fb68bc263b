//! Core library for compositing Mapbox Vector Tiles across zoom levels.
//!
//! This library assembles a requested z/x/y tile from cached ancestor (or
//! same-zoom) tiles instead of re-rendering from raw data. Each source tile
//! is decompressed, parsed, filtered for containment, and its layers are
//! either copied verbatim (same zoom) or scaled, displaced, clipped and
//! re-encoded into the output tile's coordinate space.
//!
//! # Examples
//!
//! ```no_run
//! use vtcompose_core::compose::{CompositeRequest, SourceTile};
//! use vtcompose_core::pool::Compositor;
//! use vtcompose_core::tile::TileCoord;
//!
//! let buffer = std::fs::read("z5-3-3.mvt").unwrap();
//! let request = CompositeRequest {
//!     tiles: vec![SourceTile::new(TileCoord::new(5, 3, 3), buffer)],
//!     target: TileCoord::new(7, 13, 15),
//! };
//!
//! let compositor = Compositor::new(4);
//! let composite = compositor.submit(request).wait().unwrap();
//! std::fs::write("z7-13-15.mvt", composite).unwrap();
//! ```

use thiserror::Error;

// Include the protobuf-generated code
pub mod vector_tile {
    include!(concat!(env!("OUT_DIR"), "/vector_tile.rs"));
}

pub mod clip;
pub mod compose;
pub mod decompress;
pub mod geometry;
pub mod mvt;
pub mod pool;
pub mod tile;

/// Errors that can occur while compositing vector tiles
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid composite request: {0}")]
    Validation(String),

    #[error("failed to decode tile: {0}")]
    Decode(String),

    #[error("failed to encode tile: {0}")]
    Encode(String),

    #[error("worker pool shut down before the composite completed")]
    PoolShutdown,
}

pub type Result<T> = std::result::Result<T, Error>;
