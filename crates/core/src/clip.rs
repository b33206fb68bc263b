//! Geometry clipping against the output tile window.
//!
//! After scaling and displacement, geometry lives in output-local
//! coordinates and is clipped to one canonical tile: `[0, size]` on both
//! axes. Boundary convention:
//!
//! - **Points** use half-open containment `0 <= c < size`: a point exactly
//!   on the right or bottom edge belongs to the neighboring tile and is
//!   dropped.
//! - **Lines and rings** are cut at the closed window edge; pieces that
//!   degenerate to a single position, and rings with fewer than 3 distinct
//!   coordinates, are dropped. A line running along the seam itself lies
//!   inside the closed window and is kept.
//!
//! Ring clipping is Sutherland-Hodgman against each window edge in turn,
//! which preserves winding and cannot introduce self-intersections for
//! valid input rings. Line clipping is per-segment Liang-Barsky with
//! contiguous clipped segments merged back into pieces.

use crate::geometry::{Coord, Geometry, Polygon, Ring};

/// Clip a geometry to the `[0, size] x [0, size]` output window.
///
/// Returns `None` when nothing survives; callers drop the feature silently.
pub fn clip_geometry(geom: &Geometry, size: i64) -> Option<Geometry> {
    match geom {
        Geometry::Points(points) => {
            let kept: Vec<Coord> = points
                .iter()
                .copied()
                .filter(|c| contains_point(*c, size))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::Points(kept))
            }
        }
        Geometry::Lines(lines) => {
            let mut kept: Vec<Vec<Coord>> = Vec::new();
            for line in lines {
                kept.extend(clip_line(line, size));
            }
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::Lines(kept))
            }
        }
        Geometry::Polygons(polygons) => {
            let mut kept: Vec<Polygon> = Vec::new();
            for poly in polygons {
                if let Some(clipped) = clip_polygon(poly, size) {
                    kept.push(clipped);
                }
            }
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::Polygons(kept))
            }
        }
    }
}

/// Half-open point containment: right and bottom edges are exclusive.
fn contains_point(c: Coord, size: i64) -> bool {
    c.x >= 0 && c.x < size && c.y >= 0 && c.y < size
}

// ============================================================================
// Line Clipping
// ============================================================================

/// Clip one line string, splitting it into the pieces that cross the window.
fn clip_line(line: &[Coord], size: i64) -> Vec<Vec<Coord>> {
    let mut pieces: Vec<Vec<Coord>> = Vec::new();

    for seg in line.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let Some((p, q)) = clip_segment(a, b, size) else {
            continue;
        };
        if p == q {
            continue;
        }
        match pieces.last_mut() {
            Some(piece) if piece.last() == Some(&p) => piece.push(q),
            _ => pieces.push(vec![p, q]),
        }
    }

    pieces
}

/// Liang-Barsky clip of one segment against the closed window.
fn clip_segment(a: Coord, b: Coord, size: i64) -> Option<(Coord, Coord)> {
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;

    // (p, q) per window edge: t where the segment crosses it
    let edges = [
        (-dx, a.x as f64),               // left: x >= 0
        (dx, size as f64 - a.x as f64),  // right: x <= size
        (-dy, a.y as f64),               // top: y >= 0
        (dy, size as f64 - a.y as f64),  // bottom: y <= size
    ];

    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None; // parallel and outside
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            if t > t0 {
                t0 = t;
            }
        } else {
            if t < t0 {
                return None;
            }
            if t < t1 {
                t1 = t;
            }
        }
    }

    let lerp = |t: f64| {
        Coord::new(
            clamp_round(a.x as f64 + t * dx, size),
            clamp_round(a.y as f64 + t * dy, size),
        )
    };
    Some((lerp(t0), lerp(t1)))
}

fn clamp_round(v: f64, size: i64) -> i64 {
    (v.round() as i64).clamp(0, size)
}

// ============================================================================
// Polygon Clipping
// ============================================================================

/// Clip one polygon; the whole polygon (holes included) is dropped when the
/// exterior ring clips away.
fn clip_polygon(poly: &Polygon, size: i64) -> Option<Polygon> {
    let outer = sutherland_hodgman_clip(&poly.outer, size);
    if outer.0.len() < 3 {
        return None;
    }

    let mut inners = Vec::new();
    for inner in &poly.inners {
        let clipped = sutherland_hodgman_clip(inner, size);
        if clipped.0.len() >= 3 {
            inners.push(clipped);
        }
    }

    Some(Polygon { outer, inners })
}

/// Sutherland-Hodgman polygon clipping for the axis-aligned window.
/// O(n) per ring; winding order is preserved.
fn sutherland_hodgman_clip(ring: &Ring, size: i64) -> Ring {
    let mut output: Vec<Coord> = ring.0.clone();

    // Left edge: x >= 0
    output = clip_against_edge(
        &output,
        |c| c.x >= 0,
        |c1, c2| {
            let t = (0 - c1.x) as f64 / (c2.x - c1.x) as f64;
            Coord::new(0, clamp_round(c1.y as f64 + t * (c2.y - c1.y) as f64, size))
        },
    );

    // Right edge: x <= size
    output = clip_against_edge(
        &output,
        |c| c.x <= size,
        |c1, c2| {
            let t = (size - c1.x) as f64 / (c2.x - c1.x) as f64;
            Coord::new(
                size,
                clamp_round(c1.y as f64 + t * (c2.y - c1.y) as f64, size),
            )
        },
    );

    // Top edge: y >= 0
    output = clip_against_edge(
        &output,
        |c| c.y >= 0,
        |c1, c2| {
            let t = (0 - c1.y) as f64 / (c2.y - c1.y) as f64;
            Coord::new(clamp_round(c1.x as f64 + t * (c2.x - c1.x) as f64, size), 0)
        },
    );

    // Bottom edge: y <= size
    output = clip_against_edge(
        &output,
        |c| c.y <= size,
        |c1, c2| {
            let t = (size - c1.y) as f64 / (c2.y - c1.y) as f64;
            Coord::new(
                clamp_round(c1.x as f64 + t * (c2.x - c1.x) as f64, size),
                size,
            )
        },
    );

    // Collapse duplicates the edge intersections may have introduced
    output.dedup();
    if output.len() > 1 && output.first() == output.last() {
        output.pop();
    }

    Ring(output)
}

/// Clip ring vertices against a single window edge.
fn clip_against_edge<F, I>(vertices: &[Coord], inside: F, intersect: I) -> Vec<Coord>
where
    F: Fn(&Coord) -> bool,
    I: Fn(&Coord, &Coord) -> Coord,
{
    if vertices.is_empty() {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(vertices.len());

    for i in 0..vertices.len() {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % vertices.len()];

        let current_inside = inside(current);
        let next_inside = inside(next);

        if current_inside {
            output.push(*current);
            if !next_inside {
                // Exiting: add intersection
                output.push(intersect(current, next));
            }
        } else if next_inside {
            // Entering: add intersection
            output.push(intersect(current, next));
        }
    }

    output
}
