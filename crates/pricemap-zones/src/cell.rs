//! Planar Voronoi cell construction by half-plane clipping.
//!
//! The cell of site `p` is the intersection of the half-planes
//! `{x : |x - p| <= |x - q|}` over every other site `q`, each bounded by the
//! perpendicular bisector of `p` and `q`. Starting from a convex frame and
//! clipping by each bisector in turn yields the cell restricted to the frame.

use std::f64::consts::{PI, TAU};

use geo::{Coord, Rect};

/// Slack for the half-turn test; keeps exactly collinear hull points unbounded.
const ANGLE_EPS: f64 = 1e-12;

/// Counter-clockwise open ring of the rectangle's corners.
pub(crate) fn frame_ring(frame: &Rect<f64>) -> Vec<Coord<f64>> {
    let (min, max) = (frame.min(), frame.max());
    vec![
        Coord { x: min.x, y: min.y },
        Coord { x: max.x, y: min.y },
        Coord { x: max.x, y: max.y },
        Coord { x: min.x, y: max.y },
    ]
}

/// Bounding box of the sites grown by `margin` on every side.
pub(crate) fn bounding_frame(sites: &[Coord<f64>], margin: f64) -> Option<Rect<f64>> {
    let first = *sites.first()?;
    let (mut min, mut max) = (first, first);
    for c in &sites[1..] {
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    Some(Rect::new(
        Coord {
            x: min.x - margin,
            y: min.y - margin,
        },
        Coord {
            x: max.x + margin,
            y: max.y + margin,
        },
    ))
}

/// Keep the part of a convex ring on `site`'s side of the bisector with `other`.
pub(crate) fn clip_to_bisector(
    ring: &[Coord<f64>],
    site: Coord<f64>,
    other: Coord<f64>,
) -> Vec<Coord<f64>> {
    let mid = Coord {
        x: (site.x + other.x) / 2.0,
        y: (site.y + other.y) / 2.0,
    };
    let dir = other - site;
    // <= 0 on site's side.
    let side = |c: Coord<f64>| (c.x - mid.x) * dir.x + (c.y - mid.y) * dir.y;

    let mut out = Vec::with_capacity(ring.len() + 1);
    for (i, &cur) in ring.iter().enumerate() {
        let next = ring[(i + 1) % ring.len()];
        let (s_cur, s_next) = (side(cur), side(next));
        let cur_inside = s_cur <= 0.0;
        if cur_inside {
            out.push(cur);
        }
        if cur_inside != (s_next <= 0.0) {
            let t = s_cur / (s_cur - s_next);
            out.push(cur + (next - cur) * t);
        }
    }
    dedup_ring(out)
}

/// Drop consecutive vertices that coincide (including last vs first).
fn dedup_ring(mut ring: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    ring.dedup_by(|a, b| same_point(*a, *b));
    while ring.len() > 1 && same_point(ring[0], ring[ring.len() - 1]) {
        ring.pop();
    }
    ring
}

fn same_point(a: Coord<f64>, b: Coord<f64>) -> bool {
    let scale = 1.0_f64.max(a.x.abs()).max(a.y.abs());
    (a.x - b.x).abs() <= 1e-12 * scale && (a.y - b.y).abs() <= 1e-12 * scale
}

/// Whether `site`'s Voronoi cell is unbounded.
///
/// That is the case exactly when every other site lies in a closed half-plane
/// through `site`, i.e. the directions to the others leave an angular gap of
/// at least a half turn. With a single other site the cell is a half-plane.
pub(crate) fn is_unbounded(site: Coord<f64>, sites: &[Coord<f64>]) -> bool {
    let mut angles: Vec<f64> = sites
        .iter()
        .filter(|&&q| q != site)
        .map(|q| (q.y - site.y).atan2(q.x - site.x))
        .collect();
    if angles.len() < 2 {
        return true;
    }
    angles.sort_by(f64::total_cmp);

    let wrap_gap = angles[0] + TAU - angles[angles.len() - 1];
    let max_gap = angles
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(wrap_gap, f64::max);
    max_gap >= PI - ANGLE_EPS
}
