//! End-to-end properties of the outline pipeline on synthetic masks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use spinform_pipeline::label::label;
use spinform_pipeline::outline::trace;
use spinform_pipeline::refine::refine;
use spinform_pipeline::segment::segment;
use spinform_pipeline::{
    Mask, NormalizeSpace, PipelineConfig, RgbaImage, SegmentStrategyKind, extract_polygons,
    process,
};

fn binary_alpha(width: u32, height: u32, solid: impl Fn(u32, u32) -> bool) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if solid(x, y) {
            image::Rgba([90, 160, 30, 255])
        } else {
            image::Rgba([90, 160, 30, 0])
        }
    })
}

fn centered_square(size: u32, side: u32) -> Mask {
    let start = (size - side) / 2;
    Mask::from_fn(size, size, |x, y| {
        (start..start + side).contains(&x) && (start..start + side).contains(&y)
    })
}

#[test]
fn segmentation_is_idempotent_on_binary_alpha() {
    let pixels = binary_alpha(24, 24, |x, y| (x * y) % 7 < 3 && x > 2);
    let config = PipelineConfig::default();

    let first = segment(&pixels, true, &config).unwrap();
    let second = segment(&first.processed, true, &config).unwrap();
    assert_eq!(first.mask, second.mask);
    assert_eq!(first.processed, second.processed);
}

#[test]
fn solid_square_traces_one_closed_polygon() {
    let config = PipelineConfig::default();
    for side in [3, 4, 7, 12] {
        let mask = centered_square(side + 10, side);
        let components = label(&mask, config.min_shape_size);
        assert_eq!(components.len(), 1, "side {side}");
        assert_eq!(components[0].area(), (side * side) as usize);

        let polygon = trace(&components[0], &mask, &config).expect("square should trace");
        assert!(polygon.is_closed(), "side {side}");
        // Every perimeter pixel plus the closing point.
        assert_eq!(polygon.len(), 4 * (side as usize - 1) + 1, "side {side}");
    }
}

#[test]
fn disjoint_squares_trace_independently() {
    let config = PipelineConfig::default();
    // Columns 12 and 13 separate the squares.
    let mask = Mask::from_fn(30, 16, |x, y| {
        (4..12).contains(&y) && ((4..12).contains(&x) || (14..22).contains(&x))
    });
    let components = label(&mask, config.min_shape_size);
    assert_eq!(components.len(), 2);

    let polygons: Vec<_> = components
        .iter()
        .map(|c| trace(c, &mask, &config).unwrap())
        .collect();
    for polygon in &polygons {
        let left = polygon.points().iter().all(|p| p.x <= 11.0);
        let right = polygon.points().iter().all(|p| p.x >= 14.0);
        assert!(left ^ right, "polygon spans both squares");
    }

    let extracted = extract_polygons(&mask, &config);
    assert_eq!(extracted.len(), 2);
}

#[test]
fn transparent_input_yields_no_polygons() {
    let pixels = binary_alpha(32, 32, |_, _| false);
    let result = process(&pixels, true, &PipelineConfig::default()).unwrap();
    assert!(label(&result.image.mask, 1).is_empty());
    assert!(result.polygons.is_empty());
}

#[test]
fn refine_preserves_closure_and_never_grows() {
    let config = PipelineConfig::default();
    let mask = Mask::from_fn(48, 48, |x, y| {
        let dx = f64::from(x) - 24.0;
        let dy = f64::from(y) - 24.0;
        dx.hypot(dy) < 15.0 + (dy.atan2(dx) * 5.0).sin() * 3.0
    });
    for component in label(&mask, config.min_shape_size) {
        let Some(raw) = trace(&component, &mask, &config) else {
            continue;
        };
        let refined = refine(&raw, &config);
        assert!(refined.len() <= raw.len());
        assert!(refined.is_closed());
        assert_eq!(refine(&raw, &config), refined);
    }
}

#[test]
fn one_pixel_short_of_min_size_is_dropped() {
    let config = PipelineConfig::default();
    let mask = Mask::from_fn(10, 10, |x, y| y == 5 && x < 4);
    assert_eq!(mask.solid_count(), config.min_shape_size as u64 - 1);
    assert!(label(&mask, config.min_shape_size).is_empty());
    assert!(extract_polygons(&mask, &config).is_empty());
}

#[test]
fn seeded_clustering_is_reproducible() {
    let pixels = RgbaImage::from_fn(40, 40, |x, y| {
        let inside = (10..30).contains(&x) && (12..28).contains(&y);
        let noise = u8::try_from((x * 13 + y * 7) % 9).unwrap();
        if inside {
            image::Rgba([20, 40 + noise, 160, 255])
        } else {
            image::Rgba([235 + noise, 235, 230, 255])
        }
    });
    let config = PipelineConfig {
        segment_strategy: Some(SegmentStrategyKind::DominantColorCluster),
        cluster_seed: Some(42),
        ..PipelineConfig::default()
    };

    let a = process(&pixels, false, &config).unwrap();
    let b = process(&pixels, false, &config).unwrap();
    assert_eq!(a.image.mask, b.image.mask);
    assert_eq!(a.polygons, b.polygons);
    assert_eq!(a.polygons.len(), 1);
}

#[test]
fn geometry_y_axis_points_up() {
    // A triangle-ish blob in the top half of the image.
    let mask = Mask::from_fn(40, 40, |x, y| (4..12).contains(&y) && (10..30).contains(&x));
    let config = PipelineConfig {
        normalize_space: NormalizeSpace::UnitSquare,
        ..PipelineConfig::default()
    };
    let polygons = extract_polygons(&mask, &config);
    assert_eq!(polygons.len(), 1);
    assert!(polygons[0].points().iter().all(|p| p.y > 0.5));
}
