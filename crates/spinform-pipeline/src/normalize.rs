//! Pixel-to-geometry coordinate transform.
//!
//! Image space counts pixels from the top-left corner with +Y pointing
//! down. Geometry space uses the mathematical convention of +Y pointing
//! up, so both transforms **flip** the Y axis. Without the flip,
//! extruded shapes render upside-down relative to the source texture.
//!
//! Two target spaces are supported:
//!
//! ```text
//! UnitSquare:  norm_x = x / width
//!              norm_y = 1 - y / height
//!
//! Centered:    norm_x =  (x - center_x) × 2 / shorter_dim
//!              norm_y = -(y - center_y) × 2 / shorter_dim
//! ```
//!
//! In `UnitSquare` the image maps onto `[0, 1] × [0, 1]`. In `Centered`
//! the shorter image dimension spans `[-1, 1]` and the aspect ratio is
//! preserved.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point, Polygon};

/// Target coordinate space for normalized polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeSpace {
    /// `[0, 1] × [0, 1]` with the origin at the bottom-left corner.
    #[default]
    UnitSquare,
    /// Origin at the image centre; the shorter dimension spans `[-1, 1]`.
    Centered,
}

impl NormalizeSpace {
    /// Lower-left and upper-right corners of the square this space treats
    /// as its canonical extent.
    #[must_use]
    pub const fn extent(self) -> (Point, Point) {
        match self {
            Self::UnitSquare => (Point::new(0.0, 0.0), Point::new(1.0, 1.0)),
            Self::Centered => (Point::new(-1.0, -1.0), Point::new(1.0, 1.0)),
        }
    }

    /// Map one image-space point into this space.
    #[must_use]
    pub fn map(self, p: Point, dimensions: Dimensions) -> Point {
        let width = f64::from(dimensions.width);
        let height = f64::from(dimensions.height);
        match self {
            Self::UnitSquare => Point::new(p.x / width, 1.0 - p.y / height),
            Self::Centered => {
                let scale = 2.0 / dimensions.shorter_dim();
                Point::new(
                    (p.x - width / 2.0) * scale,
                    (height / 2.0 - p.y) * scale,
                )
            }
        }
    }
}

/// Normalize pixel-space polygons into `space`.
#[must_use]
pub fn normalize_polygons(
    polygons: Vec<Polygon>,
    dimensions: Dimensions,
    space: NormalizeSpace,
) -> Vec<Polygon> {
    polygons
        .into_iter()
        .map(|polygon| {
            Polygon::new(
                polygon
                    .into_points()
                    .into_iter()
                    .map(|p| space.map(p, dimensions))
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32) -> Dimensions {
        Dimensions {
            width: w,
            height: h,
        }
    }

    fn single(space: NormalizeSpace, p: Point, d: Dimensions) -> Point {
        normalize_polygons(vec![Polygon::new(vec![p])], d, space)[0].points()[0]
    }

    #[test]
    fn unit_square_corners() {
        let d = dims(200, 100);
        let top_left = single(NormalizeSpace::UnitSquare, Point::new(0.0, 0.0), d);
        assert_eq!(top_left, Point::new(0.0, 1.0));

        let bottom_right = single(NormalizeSpace::UnitSquare, Point::new(200.0, 100.0), d);
        assert_eq!(bottom_right, Point::new(1.0, 0.0));
    }

    #[test]
    fn unit_square_flips_y() {
        let d = dims(10, 10);
        let upper = single(NormalizeSpace::UnitSquare, Point::new(5.0, 2.0), d);
        let lower = single(NormalizeSpace::UnitSquare, Point::new(5.0, 8.0), d);
        assert!(upper.y > lower.y, "higher in the image must map to larger y");
    }

    #[test]
    fn centered_center_maps_to_origin() {
        let p = single(NormalizeSpace::Centered, Point::new(50.0, 50.0), dims(100, 100));
        assert!(p.x.abs() < 1e-10);
        assert!(p.y.abs() < 1e-10);
    }

    #[test]
    fn centered_top_maps_to_positive_y() {
        let p = single(NormalizeSpace::Centered, Point::new(50.0, 0.0), dims(100, 100));
        assert!((p.y - 1.0).abs() < 1e-10, "top edge should map to y=1, got {}", p.y);
    }

    #[test]
    fn centered_uses_shorter_dimension() {
        // 200x100: shorter = 100, so the right edge sits at x = 2.
        let p = single(NormalizeSpace::Centered, Point::new(200.0, 50.0), dims(200, 100));
        assert!((p.x - 2.0).abs() < 1e-10, "got {}", p.x);
        assert!(p.y.abs() < 1e-10);
    }

    #[test]
    fn closure_survives_normalization() {
        let polygon = Polygon::new(vec![
            Point::new(1.0, 1.0),
            Point::new(4.0, 1.0),
            Point::new(4.0, 4.0),
            Point::new(1.0, 1.0),
        ]);
        for space in [NormalizeSpace::UnitSquare, NormalizeSpace::Centered] {
            let out = normalize_polygons(vec![polygon.clone()], dims(8, 8), space);
            assert!(out[0].is_closed());
            assert_eq!(out[0].len(), 4);
        }
    }

    #[test]
    fn empty_input_empty_output() {
        assert!(normalize_polygons(Vec::new(), dims(4, 4), NormalizeSpace::UnitSquare).is_empty());
    }

    #[test]
    fn extent_of_spaces() {
        assert_eq!(
            NormalizeSpace::UnitSquare.extent(),
            (Point::new(0.0, 0.0), Point::new(1.0, 1.0))
        );
        assert_eq!(
            NormalizeSpace::Centered.extent().0,
            Point::new(-1.0, -1.0)
        );
    }
}
