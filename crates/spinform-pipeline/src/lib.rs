//! spinform-pipeline: raster image to extrudable outline polygons (sans-IO).
//!
//! Converts a pixel buffer into closed, normalized polygons through:
//! segment -> label -> trace -> refine -> normalize.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! buffers and returns structured data. The [`decode`] module is a
//! caller-side helper for turning encoded bytes into a buffer. Running
//! the trace on a background thread lives in `spinform-worker`.

pub mod cluster;
pub mod decode;
pub mod diagnostics;
pub mod geometry;
pub mod label;
pub mod normalize;
pub mod outline;
pub mod refine;
pub mod segment;
pub mod types;

pub use decode::DecodedImage;
pub use geometry::{ColorParseError, Rgb, ShapeSet, ShapeStyle};
pub use label::Component;
pub use normalize::NormalizeSpace;
pub use segment::{SegmentStrategyKind, Segmenter};
pub use types::{
    Dimensions, Mask, PipelineConfig, PipelineError, PixelCoord, Point, Polygon, ProcessResult,
    ProcessedImage, RgbaImage,
};

/// Turn a binary mask into normalized outline polygons.
///
/// # Steps
///
/// 1. Label 8-connected components, dropping those below
///    [`PipelineConfig::min_shape_size`]
/// 2. Trace each component's boundary into a closed polygon; degenerate
///    components are dropped
/// 3. Smooth and simplify each polygon
/// 4. Map into [`PipelineConfig::normalize_space`]
///
/// An empty result means no usable foreground. It is not an error; the
/// renderer falls back to [`ShapeSet::fallback`].
#[must_use]
pub fn extract_polygons(mask: &Mask, config: &PipelineConfig) -> Vec<Polygon> {
    let components = label::label(mask, config.min_shape_size);
    let refined: Vec<Polygon> = components
        .iter()
        .filter_map(|c| outline::trace(c, mask, config))
        .map(|raw| refine::refine(&raw, config))
        .collect();

    tracing::debug!(
        components = components.len(),
        polygons = refined.len(),
        "extracted outline polygons"
    );

    normalize::normalize_polygons(refined, mask.dimensions(), config.normalize_space)
}

/// Run the full pipeline on a decoded pixel buffer.
///
/// `has_alpha` tells the automatic strategy selection whether the source
/// carried a meaningful alpha channel.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`].
/// Returns [`PipelineError::InvalidImage`] if either dimension is zero or
/// exceeds [`PipelineConfig::max_dimension`].
pub fn process(
    pixels: &RgbaImage,
    has_alpha: bool,
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    validate_input(pixels, config)?;
    let image = segment::segment(pixels, has_alpha, config)?;
    let polygons = extract_polygons(&image.mask, config);
    Ok(ProcessResult { image, polygons })
}

/// Decode `bytes` and run the full pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Otherwise the same as [`process`].
pub fn process_bytes(bytes: &[u8], config: &PipelineConfig) -> Result<ProcessResult, PipelineError> {
    config.validate()?;
    let decoded = decode::decode(bytes, config.max_dimension)?;
    process(&decoded.pixels, decoded.has_alpha, config)
}

/// Checks shared by every entry point that accepts a pixel buffer.
pub(crate) fn validate_input(pixels: &RgbaImage, config: &PipelineConfig) -> Result<(), PipelineError> {
    config.validate()?;
    decode::check_dimensions(Dimensions::of(pixels), config.max_dimension)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
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

    /// Transparent canvas with an opaque red disc.
    fn disc(size: u32, radius: f64) -> RgbaImage {
        let c = f64::from(size) / 2.0;
        RgbaImage::from_fn(size, size, |x, y| {
            let d = (f64::from(x) + 0.5 - c).hypot(f64::from(y) + 0.5 - c);
            if d < radius {
                image::Rgba([220, 30, 30, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn disc_yields_one_closed_polygon() {
        let result = process(&disc(64, 20.0), true, &PipelineConfig::default()).unwrap();
        assert_eq!(result.image.strategy, SegmentStrategyKind::AlphaChannel);
        assert_eq!(result.polygons.len(), 1);
        let polygon = &result.polygons[0];
        assert!(polygon.is_closed());
        assert!(polygon.len() >= 4);
        for p in polygon.points() {
            assert!((0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn empty_mask_yields_no_polygons() {
        let blank = RgbaImage::new(16, 16);
        let result = process(&blank, true, &PipelineConfig::default()).unwrap();
        assert!(result.polygons.is_empty());
        assert_eq!(result.image.mask.solid_count(), 0);
    }

    #[test]
    fn process_bytes_matches_process() {
        let img = disc(48, 15.0);
        let config = PipelineConfig::default();
        let from_bytes = process_bytes(&png_bytes(&img), &config).unwrap();
        let direct = process(&img, true, &config).unwrap();
        assert_eq!(from_bytes.polygons, direct.polygons);
    }

    #[test]
    fn process_bytes_rejects_empty_input() {
        let result = process_bytes(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let config = PipelineConfig {
            max_dimension: 32,
            ..PipelineConfig::default()
        };
        let result = process(&RgbaImage::new(33, 8), true, &config);
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let config = PipelineConfig {
            boundary_neighbor_threshold: 0,
            ..PipelineConfig::default()
        };
        let result = process(&disc(16, 5.0), true, &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn extract_polygons_is_deterministic() {
        let mask = Mask::from_rgba(&disc(40, 12.0), 128);
        let config = PipelineConfig::default();
        assert_eq!(extract_polygons(&mask, &config), extract_polygons(&mask, &config));
    }

    #[test]
    fn centered_space_is_honored() {
        let config = PipelineConfig {
            normalize_space: NormalizeSpace::Centered,
            ..PipelineConfig::default()
        };
        let result = process(&disc(64, 20.0), true, &config).unwrap();
        let points = result.polygons[0].points();
        assert!(points.iter().any(|p| p.x < 0.0));
        assert!(points.iter().all(|p| p.x.abs() <= 1.0 && p.y.abs() <= 1.0));
    }
}
