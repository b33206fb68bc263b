//! The compositing pipeline - wires together decompression, parsing,
//! containment filtering, zoom scaling, clipping and re-encoding.
//!
//! Input tiles are processed in caller-supplied order. For each tile that
//! passes the containment filter the pipeline decompresses the payload,
//! decodes the tile, and for each layer name not yet seen either copies the
//! layer verbatim (zoom factor 1) or scales, displaces, clips and re-encodes
//! every feature into a new output layer. Layer names are first-write-wins:
//! the first tile to introduce a name is its sole contributor, later tiles'
//! layers of the same name are ignored entirely.
//!
//! The first unrecoverable error (corrupt payload, malformed tile,
//! serialization failure) aborts the whole request; no partial composite is
//! ever returned.

use bytes::Bytes;
use prost::Message;

use crate::clip::clip_geometry;
use crate::decompress::decompress;
use crate::mvt::{decode_geometry, LayerBuilder};
use crate::tile::{displacement, within_target, zoom_factor, TileCoord, TILE_SIZE};
use crate::vector_tile::tile::{GeomType, Layer};
use crate::vector_tile::Tile;
use crate::{Error, Result};

/// One source tile supplied by the caller.
///
/// The payload is a [`Bytes`] handle so the worker task can hold onto it
/// without copying while the caller keeps its own reference.
#[derive(Debug, Clone)]
pub struct SourceTile {
    pub coord: TileCoord,
    pub data: Bytes,
}

impl SourceTile {
    pub fn new(coord: TileCoord, data: impl Into<Bytes>) -> Self {
        Self {
            coord,
            data: data.into(),
        }
    }
}

/// A composite request: input tiles (in contribution order) and the
/// requested output window.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub tiles: Vec<SourceTile>,
    pub target: TileCoord,
}

impl CompositeRequest {
    /// Validate the request shape before any work is scheduled.
    ///
    /// Messages are stable and name the offending field. Non-negativity of
    /// z/x/y is enforced by the `u32` coordinate types.
    pub fn validate(&self) -> Result<()> {
        if self.tiles.is_empty() {
            return Err(Error::Validation(
                "'tiles' must contain at least one tile".to_string(),
            ));
        }
        for (i, tile) in self.tiles.iter().enumerate() {
            if tile.data.is_empty() {
                return Err(Error::Validation(format!(
                    "'buffer' of tile {} in 'tiles' is empty",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// Composite the request's input tiles into a single serialized output tile.
///
/// Runs the pipeline sequentially; callers wanting off-thread execution
/// submit through [`crate::pool::Compositor`] instead. An empty result
/// (every input tile skipped or clipped away) is an empty but well-formed
/// tile, not an error.
pub fn compose(request: &CompositeRequest) -> Result<Vec<u8>> {
    request.validate()?;

    let target = request.target;
    let mut output = Tile::default();
    let mut names: Vec<String> = Vec::new();

    for source in &request.tiles {
        if !within_target(source.coord, target) {
            log::warn!(
                "skipping tile {}: not an ancestor of composite target {}",
                source.coord,
                target
            );
            continue;
        }

        let payload = decompress(&source.data)?;
        let tile = Tile::decode(payload.as_ref())
            .map_err(|e| Error::Decode(format!("malformed tile {}: {}", source.coord, e)))?;

        let factor = zoom_factor(source.coord.z, target.z).ok_or_else(|| {
            Error::Validation(format!(
                "zoom delta from tile {} to target {} is too large to composite",
                source.coord, target
            ))
        })?;
        let (dx, dy) = displacement(factor, TILE_SIZE, target);

        for layer in &tile.layers {
            if names.iter().any(|n| n == &layer.name) {
                log::debug!(
                    "layer {:?} from tile {} ignored: name already contributed",
                    layer.name,
                    source.coord
                );
                continue;
            }
            names.push(layer.name.clone());

            if factor == 1 {
                // Same zoom: copy the layer into the output untouched
                output.layers.push(layer.clone());
            } else if let Some(rebuilt) = reencode_layer(layer, factor as i64, dx, dy)? {
                output.layers.push(rebuilt);
            }
        }
    }

    let mut buffer = Vec::with_capacity(output.encoded_len());
    output
        .encode(&mut buffer)
        .map_err(|e| Error::Encode(format!("tile serialization failed: {}", e)))?;
    Ok(buffer)
}

/// Scale, displace, clip and re-encode every feature of one layer.
///
/// Returns `None` when no feature survives clipping; the layer is then
/// omitted from the output.
fn reencode_layer(layer: &Layer, factor: i64, dx: i64, dy: i64) -> Result<Option<Layer>> {
    let mut builder = LayerBuilder::for_layer(layer);

    for feature in &layer.features {
        let geom_type = feature
            .r#type
            .and_then(|t| GeomType::try_from(t).ok())
            .unwrap_or(GeomType::Unknown);
        if geom_type == GeomType::Unknown {
            // Unknown geometry types carry nothing we can transform
            continue;
        }

        let mut geom = decode_geometry(&feature.geometry, geom_type)?;
        geom.scale_offset(factor, dx, dy);

        let Some(clipped) = clip_geometry(&geom, TILE_SIZE) else {
            continue;
        };
        builder.add_feature(feature, &clipped)?;
    }

    if builder.is_empty() {
        Ok(None)
    } else {
        Ok(Some(builder.build()))
    }
}
