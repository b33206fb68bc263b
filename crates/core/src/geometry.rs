//! Typed in-memory geometry for tile features.
//!
//! Coordinates are tile-local integers relative to the source layer's
//! extent. They are held as `i64` so that multiplying by a zoom factor can
//! never overflow, even for deep zoom deltas.

/// A tile-local integer coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A closed polygon ring. The closing coordinate (equal to the first) is
/// not stored; winding is preserved from the source command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring(pub Vec<Coord>);

impl Ring {
    /// Twice the signed shoelace area of the ring in tile coordinates.
    ///
    /// Per the MVT spec, an exterior ring has positive area under this
    /// formula (y grows downward in tile space).
    pub fn signed_area2(&self) -> i64 {
        let coords = &self.0;
        let n = coords.len();
        if n < 3 {
            return 0;
        }
        let mut sum = 0i64;
        for i in 0..n {
            let a = coords[i];
            let b = coords[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum
    }

    /// Whether this ring is an exterior ring (positive signed area).
    pub fn is_outer(&self) -> bool {
        self.signed_area2() > 0
    }
}

/// A polygon: one exterior ring plus zero or more interior rings (holes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub outer: Ring,
    pub inners: Vec<Ring>,
}

/// Geometry of one feature, structured by type.
///
/// Consumers pattern-match on the variant; there is no dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Geometry {
    /// One or more points.
    Points(Vec<Coord>),
    /// One or more line strings.
    Lines(Vec<Vec<Coord>>),
    /// One or more polygons with rings.
    Polygons(Vec<Polygon>),
}

impl Geometry {
    /// True when the geometry carries no coordinates at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Points(pts) => pts.is_empty(),
            Geometry::Lines(lines) => lines.is_empty(),
            Geometry::Polygons(polys) => polys.is_empty(),
        }
    }

    /// Scale every coordinate by `factor` and translate by `(-dx, -dy)`.
    ///
    /// This moves the geometry from the source tile's coordinate space into
    /// the output window's local space in a single pass: the source tile is
    /// "zoomed into" by the factor while the requested window stays one
    /// canonical tile in size.
    pub fn scale_offset(&mut self, factor: i64, dx: i64, dy: i64) {
        let map = |c: &mut Coord| {
            c.x = c.x * factor - dx;
            c.y = c.y * factor - dy;
        };
        match self {
            Geometry::Points(pts) => pts.iter_mut().for_each(map),
            Geometry::Lines(lines) => {
                lines.iter_mut().for_each(|l| l.iter_mut().for_each(map))
            }
            Geometry::Polygons(polys) => polys.iter_mut().for_each(|p| {
                p.outer.0.iter_mut().for_each(map);
                p.inners
                    .iter_mut()
                    .for_each(|r| r.0.iter_mut().for_each(map));
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_cw() -> Ring {
        // Clockwise in screen coordinates (y down) = exterior per MVT
        Ring(vec![
            Coord::new(0, 0),
            Coord::new(10, 0),
            Coord::new(10, 10),
            Coord::new(0, 10),
        ])
    }

    #[test]
    fn test_exterior_ring_has_positive_area() {
        assert!(square_cw().signed_area2() > 0);
        assert!(square_cw().is_outer());
    }

    #[test]
    fn test_interior_ring_has_negative_area() {
        let mut ring = square_cw();
        ring.0.reverse();
        assert!(ring.signed_area2() < 0);
        assert!(!ring.is_outer());
    }

    #[test]
    fn test_degenerate_ring_has_zero_area() {
        let ring = Ring(vec![Coord::new(0, 0), Coord::new(5, 5)]);
        assert_eq!(ring.signed_area2(), 0);
    }

    #[test]
    fn test_scale_offset_point() {
        let mut geom = Geometry::Points(vec![Coord::new(2048, 2048)]);
        geom.scale_offset(2, 0, 0);
        assert_eq!(geom, Geometry::Points(vec![Coord::new(4096, 4096)]));
    }

    #[test]
    fn test_scale_offset_displaces_into_window() {
        // Point in the bottom-right quadrant of a z-1 parent, composited
        // into the bottom-right child: lands mid-window.
        let mut geom = Geometry::Points(vec![Coord::new(3072, 3072)]);
        geom.scale_offset(2, 4096, 4096);
        assert_eq!(geom, Geometry::Points(vec![Coord::new(2048, 2048)]));
    }

    #[test]
    fn test_scale_offset_deep_delta_no_overflow() {
        let mut geom = Geometry::Points(vec![Coord::new(4096, 4096)]);
        let factor = 1i64 << 20;
        geom.scale_offset(factor, 0, 0);
        assert_eq!(
            geom,
            Geometry::Points(vec![Coord::new(4096 << 20, 4096 << 20)])
        );
    }

    #[test]
    fn test_scale_offset_lines_and_polygons() {
        let mut lines = Geometry::Lines(vec![vec![Coord::new(1, 2), Coord::new(3, 4)]]);
        lines.scale_offset(4, 2, 2);
        assert_eq!(
            lines,
            Geometry::Lines(vec![vec![Coord::new(2, 6), Coord::new(10, 14)]])
        );

        let mut polys = Geometry::Polygons(vec![Polygon {
            outer: square_cw(),
            inners: vec![],
        }]);
        polys.scale_offset(2, 0, 0);
        match polys {
            Geometry::Polygons(ref ps) => {
                assert_eq!(ps[0].outer.0[1], Coord::new(20, 0));
            }
            _ => unreachable!(),
        }
    }
}
