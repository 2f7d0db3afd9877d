//! Integration test: run a synthetic logo through the full pipeline and export to SVG.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use spinform_pipeline::{NormalizeSpace, PipelineConfig, ShapeSet, ShapeStyle};

/// A ring (with a hole) and a separate bar on a transparent canvas.
fn logo_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(96, 64, |x, y| {
        let dx = f64::from(x) - 32.0;
        let dy = f64::from(y) - 32.0;
        let r = dx.hypot(dy);
        let ring = (12.0..24.0).contains(&r);
        let bar = (64..88).contains(&x) && (20..44).contains(&y);
        if ring || bar {
            image::Rgba([240, 120, 10, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

#[test]
fn logo_pipeline_to_svg() {
    let config = PipelineConfig::default();
    let result =
        spinform_pipeline::process_bytes(&logo_png(), &config).expect("pipeline should succeed");
    assert!(!result.polygons.is_empty());

    let style = ShapeStyle {
        fill: "#f0780a".parse().unwrap(),
        ..ShapeStyle::default()
    };
    let set = ShapeSet::new(result.polygons, style, NormalizeSpace::UnitSquare);
    assert!(!set.is_fallback);

    let svg = spinform_export::to_svg(
        &set,
        &spinform_export::SvgMetadata {
            title: Some("logo"),
            description: None,
        },
    );

    assert!(svg.contains("<svg"));
    assert!(svg.contains("<title>logo</title>"));
    assert!(svg.contains(r##"fill="#f0780a""##));
    assert_eq!(svg.matches("<path").count(), set.polygons.len());
    assert!(svg.contains("</svg>"));
}

#[test]
fn blank_image_exports_fallback_square() {
    let img = image::RgbaImage::new(8, 8);
    let config = PipelineConfig::default();
    let result = spinform_pipeline::process(&img, true, &config).unwrap();

    let set = ShapeSet::new(result.polygons, ShapeStyle::default(), config.normalize_space);
    let svg = spinform_export::to_svg(&set, &spinform_export::SvgMetadata::default());
    assert!(svg.contains(r#"data-fallback="true""#));
    assert!(svg.contains("M0,512 L512,512 L512,0 L0,0"), "got {svg}");
}
