//! Outline extraction: order a component's boundary pixels into one
//! closed polygon.
//!
//! # Algorithm
//!
//! 1. **Boundary pixels:** solid pixels of the component with at least
//!    [`PipelineConfig::boundary_neighbor_threshold`] non-solid
//!    8-neighbours (pixels outside the image count as non-solid).
//! 2. **Greedy walk:** starting from the leftmost boundary pixel (ties go
//!    to the topmost), repeatedly step to the best remaining boundary
//!    pixel within [`PipelineConfig::max_neighbor_distance`]. Candidates
//!    that would turn more than [`PipelineConfig::max_turn_angle`] away
//!    from the previous step are rejected. The smallest turn wins;
//!    candidates within [`PipelineConfig::angle_tie_tolerance`] of that
//!    turn are treated as equal and the nearest of them is taken.
//! 3. **Fallback:** if nothing lies within the search radius, the nearest
//!    candidate within [`PipelineConfig::fallback_distance`] (same turn
//!    filter) is taken. If there is none, the walk ends.
//! 4. **Closing:** a walk of at least three points is closed by repeating
//!    its first point. Shorter walks yield no polygon.
//!
//! Visited pixels are removed from an R\*-tree, so each pixel appears at
//! most once and every neighbour query only touches nearby points.
//!
//! The walk is a heuristic. It does not promise to visit every boundary
//! pixel, and on concave or noisy shapes the resulting polygon may cross
//! itself.

use std::cmp::Ordering;

use rstar::RTree;

use crate::label::Component;
use crate::types::{Mask, NEIGHBOR_OFFSETS, PipelineConfig, PixelCoord, Point, Polygon};

/// Boundary pixel as stored in the R\*-tree.
type GridPoint = [i64; 2];

const fn to_grid(p: PixelCoord) -> GridPoint {
    [p.x as i64, p.y as i64]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn from_grid(p: GridPoint) -> PixelCoord {
    PixelCoord::new(p[0] as u32, p[1] as u32)
}

/// Parameters of the greedy walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    /// Primary search radius in pixels.
    pub max_neighbor_distance: f64,
    /// Secondary search radius in pixels.
    pub fallback_distance: f64,
    /// Largest allowed turn between consecutive steps, in radians.
    pub max_turn_angle: f64,
    /// Turn-angle band treated as a tie, in radians.
    pub angle_tie_tolerance: f64,
}

impl From<&PipelineConfig> for WalkParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_neighbor_distance: config.max_neighbor_distance,
            fallback_distance: config.fallback_distance,
            max_turn_angle: config.max_turn_angle,
            angle_tie_tolerance: config.angle_tie_tolerance,
        }
    }
}

/// Outcome of tracing one component.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// Number of boundary pixels the walk could draw from.
    pub boundary_points: usize,
    /// Number of boundary pixels the walk visited.
    pub visited_points: usize,
    /// The closed polygon, or `None` for a degenerate component.
    pub polygon: Option<Polygon>,
}

/// Trace `component` into a closed polygon in image coordinates.
///
/// Returns `None` when fewer than three boundary pixels could be walked.
#[must_use]
pub fn trace(component: &Component, mask: &Mask, config: &PipelineConfig) -> Option<Polygon> {
    trace_detailed(component, mask, config).polygon
}

/// Like [`trace`], but also reports boundary coverage.
#[must_use]
pub fn trace_detailed(component: &Component, mask: &Mask, config: &PipelineConfig) -> Trace {
    let boundary = boundary_points(component, mask, config.boundary_neighbor_threshold);
    let path = walk(&boundary, WalkParams::from(config));
    debug_assert!(path.len() <= boundary.len());

    let visited_points = path.len();
    let polygon = if path.len() >= 3 {
        let mut points: Vec<Point> = path.into_iter().map(Point::from).collect();
        points.push(points[0]);
        Some(Polygon::new(points))
    } else {
        tracing::debug!(
            component = component.id,
            area = component.area(),
            walked = path.len(),
            "dropped degenerate component"
        );
        None
    };

    tracing::trace!(
        component = component.id,
        boundary = boundary.len(),
        visited = visited_points,
        "traced component outline"
    );

    Trace {
        boundary_points: boundary.len(),
        visited_points,
        polygon,
    }
}

/// Boundary pixels of `component`, in row-major order.
#[must_use]
pub fn boundary_points(component: &Component, mask: &Mask, threshold: u8) -> Vec<PixelCoord> {
    let mut points: Vec<PixelCoord> = component
        .pixels
        .iter()
        .copied()
        .filter(|p| open_neighbors(mask, *p) >= threshold)
        .collect();
    points.sort_unstable_by_key(|p| (p.y, p.x));
    points
}

/// Number of non-solid pixels among the 8 neighbours of `p`.
fn open_neighbors(mask: &Mask, p: PixelCoord) -> u8 {
    let (x, y) = (i64::from(p.x), i64::from(p.y));
    let open = NEIGHBOR_OFFSETS
        .iter()
        .filter(|&&(dx, dy)| !mask.is_solid(x + i64::from(dx), y + i64::from(dy)))
        .count();
    // At most 8.
    u8::try_from(open).unwrap_or(u8::MAX)
}

/// A remaining boundary pixel considered as the next step.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    point: GridPoint,
    distance: f64,
    angle: f64,
}

/// Nearest first, then straightest, then row-major.
fn by_distance(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.angle.total_cmp(&b.angle))
        .then(a.point[1].cmp(&b.point[1]))
        .then(a.point[0].cmp(&b.point[0]))
}

/// Order `points` into a single path with the greedy nearest-candidate
/// walk. Each point appears at most once; points the walk cannot reach
/// are left out.
#[must_use]
pub fn walk(points: &[PixelCoord], params: WalkParams) -> Vec<PixelCoord> {
    let Some(&start) = points.iter().min_by_key(|p| (p.x, p.y)) else {
        return Vec::new();
    };

    let mut remaining = RTree::bulk_load(points.iter().copied().map(to_grid).collect());
    let mut path = Vec::with_capacity(points.len());
    let mut current = to_grid(start);
    let mut direction: Option<(f64, f64)> = None;

    loop {
        remaining.remove(&current);
        path.push(from_grid(current));
        if remaining.size() == 0 {
            break;
        }

        let Some(next) = next_point(&remaining, current, direction, params) else {
            tracing::trace!(
                stranded = remaining.size(),
                "outline walk ended before visiting every boundary pixel"
            );
            break;
        };

        #[allow(clippy::cast_precision_loss)]
        let step = ((next[0] - current[0]) as f64, (next[1] - current[1]) as f64);
        direction = Some(step);
        current = next;
    }

    path
}

/// Pick the next step from `current`, or `None` to end the walk.
fn next_point(
    remaining: &RTree<GridPoint>,
    current: GridPoint,
    direction: Option<(f64, f64)>,
    params: WalkParams,
) -> Option<GridPoint> {
    let near = candidates(
        remaining,
        current,
        direction,
        params.max_neighbor_distance,
        params.max_turn_angle,
    );

    if near.is_empty() {
        return candidates(
            remaining,
            current,
            direction,
            params.fallback_distance,
            params.max_turn_angle,
        )
        .into_iter()
        .min_by(by_distance)
        .map(|c| c.point);
    }

    let best_angle = near
        .iter()
        .map(|c| c.angle)
        .fold(f64::INFINITY, f64::min);
    near.into_iter()
        .filter(|c| c.angle <= best_angle + params.angle_tie_tolerance)
        .min_by(by_distance)
        .map(|c| c.point)
}

/// Remaining points within `radius` of `current` whose turn from
/// `direction` does not exceed `max_turn`.
fn candidates(
    remaining: &RTree<GridPoint>,
    current: GridPoint,
    direction: Option<(f64, f64)>,
    radius: f64,
    max_turn: f64,
) -> Vec<Candidate> {
    // Squared distances between grid points are integers, so flooring
    // the squared radius keeps exactly the points within `radius`.
    #[allow(clippy::cast_possible_truncation)]
    let max_squared = (radius * radius).floor() as i64;

    remaining
        .locate_within_distance(current, max_squared)
        .filter_map(|&point| {
            #[allow(clippy::cast_precision_loss)]
            let step = (
                (point[0] - current[0]) as f64,
                (point[1] - current[1]) as f64,
            );
            let angle = direction.map_or(0.0, |d| turn_angle(d, step));
            (angle <= max_turn).then(|| Candidate {
                point,
                distance: step.0.hypot(step.1),
                angle,
            })
        })
        .collect()
}

/// Angle in radians (`0..=PI`) between two direction vectors.
fn turn_angle(a: (f64, f64), b: (f64, f64)) -> f64 {
    let magnitude = a.0.hypot(a.1) * b.0.hypot(b.1);
    if magnitude == 0.0 {
        return 0.0;
    }
    let dot = a.0.mul_add(b.0, a.1 * b.1);
    (dot / magnitude).clamp(-1.0, 1.0).acos()
}
