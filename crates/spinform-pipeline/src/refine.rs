//! Polygon post-processing: one smoothing pass followed by a local
//! angle/distance simplification.
//!
//! Both steps are deterministic and never add points. Closed polygons
//! stay closed.

use std::f64::consts::{PI, TAU};

use crate::types::{PipelineConfig, Point, Polygon};

/// Smooth and then simplify a traced polygon.
#[must_use = "returns the refined polygon"]
pub fn refine(raw: &Polygon, config: &PipelineConfig) -> Polygon {
    let smoothed = smooth(raw, config.smoothing_factor);
    simplify(
        &smoothed,
        config.simplify_angle_threshold,
        config.simplify_distance_threshold,
    )
}

/// Pull every point toward the midpoint of its two ring neighbours by
/// `factor` (0 leaves the polygon unchanged, 1 moves each point onto the
/// midpoint).
///
/// Neighbour indices wrap around. For a closed polygon the ring excludes
/// the closing point, which is re-appended afterwards. Polygons of three
/// points or fewer are returned unchanged; a closed triangle has four and
/// is smoothed.
#[must_use = "returns the smoothed polygon"]
pub fn smooth(polygon: &Polygon, factor: f64) -> Polygon {
    let closed = polygon.is_closed();
    let points = polygon.points();
    let ring = if closed {
        &points[..points.len() - 1]
    } else {
        points
    };

    if factor == 0.0 || points.len() <= 3 {
        return polygon.clone();
    }

    let n = ring.len();
    let mut smoothed: Vec<Point> = (0..n)
        .map(|i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            let p = ring[i];
            let mid_x = (prev.x + next.x) / 2.0;
            let mid_y = (prev.y + next.y) / 2.0;
            Point::new(
                factor.mul_add(mid_x - p.x, p.x),
                factor.mul_add(mid_y - p.y, p.y),
            )
        })
        .collect();

    if closed {
        smoothed.push(smoothed[0]);
    }
    Polygon::new(smoothed)
}

/// Drop points that neither turn nor travel far.
///
/// A single pass keeps the first and last points. An interior point is
/// kept when any of these exceed `angle_threshold` (radians) or
/// `distance_threshold` (pixels):
///
/// - the heading change at the point, from the last kept point to the
///   next point;
/// - the heading change relative to the heading at the last kept point,
///   which starts at 0 (pointing along +x);
/// - its distance from the last kept point.
///
/// Polygons of three points or fewer are returned unchanged.
#[must_use = "returns the simplified polygon"]
pub fn simplify(polygon: &Polygon, angle_threshold: f64, distance_threshold: f64) -> Polygon {
    let points = polygon.points();
    if points.len() <= 3 {
        return polygon.clone();
    }

    let mut kept = vec![points[0]];
    let mut kept_heading = 0.0;

    for window in points.windows(2).skip(1) {
        let (current, next) = (window[0], window[1]);
        let last = kept[kept.len() - 1];

        let heading_in = last.heading_to(current);
        let heading_out = current.heading_to(next);

        let turns = angle_between(heading_in, heading_out) > angle_threshold;
        let drifts = angle_between(kept_heading, heading_in) > angle_threshold;
        let travels = last.distance(current) > distance_threshold;

        if turns || drifts || travels {
            kept.push(current);
            kept_heading = heading_in;
        }
    }

    kept.push(points[points.len() - 1]);
    Polygon::new(kept)
}

/// Absolute difference between two headings, wrapped to `0..=PI`.
fn angle_between(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % TAU;
    if d > PI { TAU - d } else { d }
}
