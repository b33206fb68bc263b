//! MVT command-stream codec and output layer building.
//!
//! Feature geometry in a vector tile is a stream of packed `u32` values:
//!
//! - **Commands**: `(command_id | (count << 3))` with MoveTo=1, LineTo=2,
//!   ClosePath=7
//! - **Parameters**: zigzag-encoded deltas from the previous position
//!
//! This module decodes a feature's stream into a typed [`Geometry`],
//! re-encodes clipped geometry back into a stream, and rebuilds layers with
//! feature ids and properties carried over from the source layer.
//!
//! Reference: <https://github.com/mapbox/vector-tile-spec>

use std::collections::HashMap;

use crate::geometry::{Coord, Geometry, Polygon, Ring};
use crate::vector_tile::tile::{Feature, GeomType, Layer, Value};
use crate::{Error, Result};

/// MVT command IDs
const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

// ============================================================================
// Zigzag & Command Encoding
// ============================================================================

/// Encode a signed integer using zigzag encoding.
#[inline]
pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Decode a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Pack a command with a repeat count.
#[inline]
pub fn command_encode(command_id: u32, count: u32) -> u32 {
    (command_id & 0x7) | (count << 3)
}

/// Unpack a command into (command_id, count).
#[inline]
pub fn command_decode(command: u32) -> (u32, u32) {
    (command & 0x7, command >> 3)
}

// ============================================================================
// Geometry Decoding
// ============================================================================

/// Cursor over a feature's packed geometry stream.
struct GeometryCursor<'a> {
    data: &'a [u32],
    pos: usize,
    x: i64,
    y: i64,
}

impl<'a> GeometryCursor<'a> {
    fn new(data: &'a [u32]) -> Self {
        Self {
            data,
            pos: 0,
            x: 0,
            y: 0,
        }
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn next_command(&mut self) -> Result<(u32, u32)> {
        let raw = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::Decode("truncated geometry command stream".to_string()))?;
        self.pos += 1;
        Ok(command_decode(raw))
    }

    /// Read one zigzag-encoded delta pair and advance the cursor position.
    fn next_point(&mut self) -> Result<Coord> {
        if self.pos + 2 > self.data.len() {
            return Err(Error::Decode(
                "truncated geometry parameter stream".to_string(),
            ));
        }
        let dx = zigzag_decode(self.data[self.pos]) as i64;
        let dy = zigzag_decode(self.data[self.pos + 1]) as i64;
        self.pos += 2;
        self.x += dx;
        self.y += dy;
        Ok(Coord::new(self.x, self.y))
    }
}

/// Decode a feature's command stream into a typed geometry.
///
/// Multi-part structure, ring grouping and winding are preserved. A
/// structurally malformed stream (unexpected command, truncated parameters,
/// interior ring with no preceding exterior) is a [`Error::Decode`].
pub fn decode_geometry(data: &[u32], geom_type: GeomType) -> Result<Geometry> {
    match geom_type {
        GeomType::Point => decode_points(data),
        GeomType::Linestring => decode_lines(data),
        GeomType::Polygon => decode_polygons(data),
        GeomType::Unknown => Err(Error::Decode("unknown feature geometry type".to_string())),
    }
}

fn decode_points(data: &[u32]) -> Result<Geometry> {
    let mut cursor = GeometryCursor::new(data);
    let mut points = Vec::new();

    while !cursor.done() {
        let (cmd, count) = cursor.next_command()?;
        if cmd != CMD_MOVE_TO || count == 0 {
            return Err(Error::Decode(format!(
                "unexpected command {} in point geometry",
                cmd
            )));
        }
        for _ in 0..count {
            points.push(cursor.next_point()?);
        }
    }

    Ok(Geometry::Points(points))
}

fn decode_lines(data: &[u32]) -> Result<Geometry> {
    let mut cursor = GeometryCursor::new(data);
    let mut lines = Vec::new();

    while !cursor.done() {
        let (cmd, count) = cursor.next_command()?;
        if cmd != CMD_MOVE_TO || count != 1 {
            return Err(Error::Decode(format!(
                "line string must start with MoveTo(1), got command {} count {}",
                cmd, count
            )));
        }
        let mut line = vec![cursor.next_point()?];

        let (cmd, count) = cursor.next_command()?;
        if cmd != CMD_LINE_TO || count == 0 {
            return Err(Error::Decode(format!(
                "expected LineTo after MoveTo, got command {}",
                cmd
            )));
        }
        for _ in 0..count {
            line.push(cursor.next_point()?);
        }
        lines.push(line);
    }

    Ok(Geometry::Lines(lines))
}

fn decode_polygons(data: &[u32]) -> Result<Geometry> {
    let mut cursor = GeometryCursor::new(data);
    let mut polygons: Vec<Polygon> = Vec::new();

    while !cursor.done() {
        let (cmd, count) = cursor.next_command()?;
        if cmd != CMD_MOVE_TO || count != 1 {
            return Err(Error::Decode(format!(
                "polygon ring must start with MoveTo(1), got command {} count {}",
                cmd, count
            )));
        }
        let mut coords = vec![cursor.next_point()?];

        let (cmd, count) = cursor.next_command()?;
        if cmd != CMD_LINE_TO || count == 0 {
            return Err(Error::Decode(format!(
                "expected LineTo in polygon ring, got command {}",
                cmd
            )));
        }
        for _ in 0..count {
            coords.push(cursor.next_point()?);
        }

        let (cmd, _) = cursor.next_command()?;
        if cmd != CMD_CLOSE_PATH {
            return Err(Error::Decode(format!(
                "polygon ring must end with ClosePath, got command {}",
                cmd
            )));
        }

        let ring = Ring(coords);
        let area2 = ring.signed_area2();
        if area2 > 0 {
            polygons.push(Polygon {
                outer: ring,
                inners: Vec::new(),
            });
        } else if area2 < 0 {
            match polygons.last_mut() {
                Some(poly) => poly.inners.push(ring),
                None => {
                    return Err(Error::Decode(
                        "interior ring with no preceding exterior ring".to_string(),
                    ))
                }
            }
        }
        // Zero-area rings are degenerate and dropped.
    }

    Ok(Geometry::Polygons(polygons))
}

// ============================================================================
// Geometry Encoding
// ============================================================================

fn checked_delta(to: i64, from: i64) -> Result<i32> {
    i32::try_from(to - from)
        .map_err(|_| Error::Encode(format!("coordinate delta {} out of range", to - from)))
}

struct StreamEncoder {
    stream: Vec<u32>,
    x: i64,
    y: i64,
}

impl StreamEncoder {
    fn new() -> Self {
        Self {
            stream: Vec::new(),
            x: 0,
            y: 0,
        }
    }

    fn command(&mut self, id: u32, count: u32) {
        self.stream.push(command_encode(id, count));
    }

    fn point(&mut self, c: Coord) -> Result<()> {
        let dx = checked_delta(c.x, self.x)?;
        let dy = checked_delta(c.y, self.y)?;
        self.stream.push(zigzag_encode(dx));
        self.stream.push(zigzag_encode(dy));
        self.x = c.x;
        self.y = c.y;
        Ok(())
    }
}

/// Encode a typed geometry back into a packed command stream.
///
/// Returns the stream plus the wire geometry type. Degenerate parts (lines
/// with fewer than 2 distinct points, rings with fewer than 4 coordinates
/// counting closure) are dropped; an entirely degenerate geometry encodes to
/// an empty stream.
pub fn encode_geometry(geom: &Geometry) -> Result<(Vec<u32>, GeomType)> {
    let mut enc = StreamEncoder::new();
    let geom_type = match geom {
        Geometry::Points(points) => {
            if !points.is_empty() {
                enc.command(CMD_MOVE_TO, points.len() as u32);
                for &p in points {
                    enc.point(p)?;
                }
            }
            GeomType::Point
        }
        Geometry::Lines(lines) => {
            for line in lines {
                encode_line(&mut enc, line)?;
            }
            GeomType::Linestring
        }
        Geometry::Polygons(polygons) => {
            for poly in polygons {
                if !encode_ring(&mut enc, &poly.outer)? {
                    // Degenerate exterior: skip the holes too
                    continue;
                }
                for inner in &poly.inners {
                    encode_ring(&mut enc, inner)?;
                }
            }
            GeomType::Polygon
        }
    };
    Ok((enc.stream, geom_type))
}

fn encode_line(enc: &mut StreamEncoder, line: &[Coord]) -> Result<()> {
    // Collapse consecutive duplicates introduced by clipping
    let mut deduped: Vec<Coord> = Vec::with_capacity(line.len());
    for &c in line {
        if deduped.last() != Some(&c) {
            deduped.push(c);
        }
    }
    if deduped.len() < 2 {
        return Ok(());
    }

    enc.command(CMD_MOVE_TO, 1);
    enc.point(deduped[0])?;
    enc.command(CMD_LINE_TO, (deduped.len() - 1) as u32);
    for &c in &deduped[1..] {
        enc.point(c)?;
    }
    Ok(())
}

/// Encode one ring; returns false when the ring is degenerate and skipped.
fn encode_ring(enc: &mut StreamEncoder, ring: &Ring) -> Result<bool> {
    let mut deduped: Vec<Coord> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if deduped.last() != Some(&c) {
            deduped.push(c);
        }
    }
    // The stored ring omits the closing point; strip it if present anyway
    if deduped.len() > 1 && deduped.first() == deduped.last() {
        deduped.pop();
    }
    if deduped.len() < 3 {
        return Ok(false);
    }

    enc.command(CMD_MOVE_TO, 1);
    enc.point(deduped[0])?;
    enc.command(CMD_LINE_TO, (deduped.len() - 1) as u32);
    for &c in &deduped[1..] {
        enc.point(c)?;
    }
    enc.command(CMD_CLOSE_PATH, 1);
    Ok(true)
}

// ============================================================================
// Layer Building
// ============================================================================

/// Builder for one re-encoded output layer.
///
/// Inherits name, version and extent from the source layer. Feature ids are
/// copied; property tags are remapped through an index map so that only the
/// keys and values actually referenced by surviving features land in the
/// output, each exactly once.
pub struct LayerBuilder<'a> {
    source: &'a Layer,
    features: Vec<Feature>,
    keys: Vec<String>,
    values: Vec<Value>,
    key_map: HashMap<u32, u32>,
    value_map: HashMap<u32, u32>,
}

impl<'a> LayerBuilder<'a> {
    /// Create a builder inheriting the source layer's metadata.
    pub fn for_layer(source: &'a Layer) -> Self {
        Self {
            source,
            features: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
            key_map: HashMap::new(),
            value_map: HashMap::new(),
        }
    }

    /// Remap one source key index into the output key table.
    fn map_key(&mut self, src_idx: u32) -> Result<u32> {
        if let Some(&idx) = self.key_map.get(&src_idx) {
            return Ok(idx);
        }
        let key = self.source.keys.get(src_idx as usize).ok_or_else(|| {
            Error::Decode(format!("feature tag references key index {} out of range", src_idx))
        })?;
        let idx = self.keys.len() as u32;
        self.keys.push(key.clone());
        self.key_map.insert(src_idx, idx);
        Ok(idx)
    }

    /// Remap one source value index into the output value table.
    fn map_value(&mut self, src_idx: u32) -> Result<u32> {
        if let Some(&idx) = self.value_map.get(&src_idx) {
            return Ok(idx);
        }
        let value = self.source.values.get(src_idx as usize).ok_or_else(|| {
            Error::Decode(format!(
                "feature tag references value index {} out of range",
                src_idx
            ))
        })?;
        let idx = self.values.len() as u32;
        self.values.push(value.clone());
        self.value_map.insert(src_idx, idx);
        Ok(idx)
    }

    /// Add a re-encoded feature, carrying over the source feature's id and
    /// properties unchanged.
    ///
    /// Features whose geometry encodes to an empty stream are dropped.
    pub fn add_feature(&mut self, source_feature: &Feature, geom: &Geometry) -> Result<()> {
        let (stream, geom_type) = encode_geometry(geom)?;
        if stream.is_empty() {
            return Ok(());
        }

        if source_feature.tags.len() % 2 != 0 {
            return Err(Error::Decode(
                "feature tag list has odd length".to_string(),
            ));
        }
        let mut tags = Vec::with_capacity(source_feature.tags.len());
        for pair in source_feature.tags.chunks(2) {
            tags.push(self.map_key(pair[0])?);
            tags.push(self.map_value(pair[1])?);
        }

        self.features.push(Feature {
            id: source_feature.id,
            tags,
            r#type: Some(geom_type as i32),
            geometry: stream,
        });
        Ok(())
    }

    /// True when no feature survived re-encoding.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Build the output layer.
    pub fn build(self) -> Layer {
        Layer {
            version: self.source.version,
            name: self.source.name.clone(),
            features: self.features,
            keys: self.keys,
            values: self.values,
            extent: self.source.extent,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Zigzag & Command Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_zigzag_encode() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
    }

    #[test]
    fn test_zigzag_roundtrip() {
        for n in -5000..=5000 {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn test_command_encode() {
        // MoveTo with count=1: (1 | (1 << 3)) = 9
        assert_eq!(command_encode(CMD_MOVE_TO, 1), 9);
        // LineTo with count=3: (2 | (3 << 3)) = 26
        assert_eq!(command_encode(CMD_LINE_TO, 3), 26);
        // ClosePath with count=1: (7 | (1 << 3)) = 15
        assert_eq!(command_encode(CMD_CLOSE_PATH, 1), 15);
    }

    #[test]
    fn test_command_roundtrip() {
        for cmd_id in [CMD_MOVE_TO, CMD_LINE_TO, CMD_CLOSE_PATH] {
            for count in 1..=100 {
                let (id, c) = command_decode(command_encode(cmd_id, count));
                assert_eq!(id, cmd_id);
                assert_eq!(c, count);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Geometry Decode Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_decode_single_point() {
        // MoveTo(1), (25, 17)
        let stream = vec![9, 50, 34];
        let geom = decode_geometry(&stream, GeomType::Point).unwrap();
        assert_eq!(geom, Geometry::Points(vec![Coord::new(25, 17)]));
    }

    #[test]
    fn test_decode_multi_point() {
        // MoveTo(2), (5, 7), (3, 2): deltas accumulate
        let stream = vec![
            command_encode(CMD_MOVE_TO, 2),
            zigzag_encode(5),
            zigzag_encode(7),
            zigzag_encode(-2),
            zigzag_encode(-5),
        ];
        let geom = decode_geometry(&stream, GeomType::Point).unwrap();
        assert_eq!(
            geom,
            Geometry::Points(vec![Coord::new(5, 7), Coord::new(3, 2)])
        );
    }

    #[test]
    fn test_decode_linestring() {
        // MoveTo(1) (2,2), LineTo(2) (2,10) (10,10)
        let stream = vec![9, 4, 4, 18, 0, 16, 16, 0];
        let geom = decode_geometry(&stream, GeomType::Linestring).unwrap();
        assert_eq!(
            geom,
            Geometry::Lines(vec![vec![
                Coord::new(2, 2),
                Coord::new(2, 10),
                Coord::new(10, 10),
            ]])
        );
    }

    #[test]
    fn test_decode_polygon_with_hole() {
        let outer = Ring(vec![
            Coord::new(0, 0),
            Coord::new(100, 0),
            Coord::new(100, 100),
            Coord::new(0, 100),
        ]);
        let inner = Ring(vec![
            Coord::new(20, 20),
            Coord::new(20, 40),
            Coord::new(40, 40),
            Coord::new(40, 20),
        ]);
        let geom = Geometry::Polygons(vec![Polygon {
            outer,
            inners: vec![inner],
        }]);

        let (stream, geom_type) = encode_geometry(&geom).unwrap();
        assert_eq!(geom_type, GeomType::Polygon);

        let decoded = decode_geometry(&stream, GeomType::Polygon).unwrap();
        assert_eq!(decoded, geom);
    }

    #[test]
    fn test_decode_rejects_truncated_stream() {
        // MoveTo(1) but only one parameter
        let stream = vec![9, 50];
        assert!(matches!(
            decode_geometry(&stream, GeomType::Point),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(matches!(
            decode_geometry(&[9, 50, 34], GeomType::Unknown),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_orphan_interior_ring() {
        // A single counter-clockwise (negative area) ring decodes as an
        // interior ring with no exterior to attach to
        let ccw = Ring(vec![
            Coord::new(0, 0),
            Coord::new(0, 10),
            Coord::new(10, 10),
            Coord::new(10, 0),
        ]);
        assert!(ccw.signed_area2() < 0);

        let (stream, _) = encode_geometry(&Geometry::Polygons(vec![Polygon {
            outer: ccw,
            inners: vec![],
        }]))
        .unwrap();
        assert!(matches!(
            decode_geometry(&stream, GeomType::Polygon),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_geometry_roundtrip_lines() {
        let geom = Geometry::Lines(vec![
            vec![Coord::new(0, 0), Coord::new(10, 0), Coord::new(10, 5)],
            vec![Coord::new(100, 100), Coord::new(200, 150)],
        ]);
        let (stream, geom_type) = encode_geometry(&geom).unwrap();
        assert_eq!(geom_type, GeomType::Linestring);
        assert_eq!(decode_geometry(&stream, geom_type).unwrap(), geom);
    }

    // ------------------------------------------------------------------------
    // Encode Degeneracy Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_encode_drops_short_line() {
        let geom = Geometry::Lines(vec![vec![Coord::new(5, 5)]]);
        let (stream, _) = encode_geometry(&geom).unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_encode_drops_duplicate_only_line() {
        let geom = Geometry::Lines(vec![vec![Coord::new(5, 5), Coord::new(5, 5)]]);
        let (stream, _) = encode_geometry(&geom).unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_encode_drops_degenerate_ring_and_its_holes() {
        let geom = Geometry::Polygons(vec![Polygon {
            outer: Ring(vec![Coord::new(0, 0), Coord::new(1, 1)]),
            inners: vec![Ring(vec![
                Coord::new(0, 0),
                Coord::new(0, 5),
                Coord::new(5, 5),
                Coord::new(5, 0),
            ])],
        }]);
        let (stream, _) = encode_geometry(&geom).unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_encode_rejects_out_of_range_delta() {
        let geom = Geometry::Points(vec![Coord::new(i64::from(i32::MAX) * 4, 0)]);
        assert!(matches!(encode_geometry(&geom), Err(Error::Encode(_))));
    }

    // ------------------------------------------------------------------------
    // LayerBuilder Tests
    // ------------------------------------------------------------------------

    fn source_layer() -> Layer {
        Layer {
            version: 2,
            name: "roads".to_string(),
            features: Vec::new(),
            keys: vec!["kind".to_string(), "name".to_string()],
            values: vec![
                Value {
                    string_value: Some("highway".to_string()),
                    ..Default::default()
                },
                Value {
                    string_value: Some("A1".to_string()),
                    ..Default::default()
                },
            ],
            extent: Some(4096),
        }
    }

    fn point_feature(tags: Vec<u32>) -> Feature {
        Feature {
            id: Some(42),
            tags,
            r#type: Some(GeomType::Point as i32),
            geometry: vec![9, 50, 34],
        }
    }

    #[test]
    fn test_layer_builder_inherits_metadata() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        builder
            .add_feature(
                &point_feature(vec![0, 0]),
                &Geometry::Points(vec![Coord::new(10, 10)]),
            )
            .unwrap();
        let layer = builder.build();

        assert_eq!(layer.version, 2);
        assert_eq!(layer.name, "roads");
        assert_eq!(layer.extent, Some(4096));
    }

    #[test]
    fn test_layer_builder_remaps_tags() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        // Only references key 1 / value 1; output tables must shrink
        builder
            .add_feature(
                &point_feature(vec![1, 1]),
                &Geometry::Points(vec![Coord::new(10, 10)]),
            )
            .unwrap();
        let layer = builder.build();

        assert_eq!(layer.keys, vec!["name".to_string()]);
        assert_eq!(layer.values.len(), 1);
        assert_eq!(layer.values[0].string_value.as_deref(), Some("A1"));
        assert_eq!(layer.features[0].tags, vec![0, 0]);
        assert_eq!(layer.features[0].id, Some(42));
    }

    #[test]
    fn test_layer_builder_dedupes_shared_properties() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        for _ in 0..3 {
            builder
                .add_feature(
                    &point_feature(vec![0, 0]),
                    &Geometry::Points(vec![Coord::new(10, 10)]),
                )
                .unwrap();
        }
        let layer = builder.build();
        assert_eq!(layer.features.len(), 3);
        assert_eq!(layer.keys.len(), 1);
        assert_eq!(layer.values.len(), 1);
    }

    #[test]
    fn test_layer_builder_drops_empty_geometry() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        builder
            .add_feature(&point_feature(vec![]), &Geometry::Points(vec![]))
            .unwrap();
        assert!(builder.is_empty());
    }

    #[test]
    fn test_layer_builder_rejects_bad_tag_index() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        let result = builder.add_feature(
            &point_feature(vec![7, 0]),
            &Geometry::Points(vec![Coord::new(10, 10)]),
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_layer_builder_rejects_odd_tag_list() {
        let source = source_layer();
        let mut builder = LayerBuilder::for_layer(&source);
        let result = builder.add_feature(
            &point_feature(vec![0]),
            &Geometry::Points(vec![Coord::new(10, 10)]),
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
