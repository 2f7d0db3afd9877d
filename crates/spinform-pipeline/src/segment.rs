//! Foreground segmentation: split a pixel buffer into content and
//! background.
//!
//! This module defines the [`Segmenter`] trait for pluggable segmentation
//! strategies and the [`SegmentStrategyKind`] enum for selecting one at
//! runtime, either explicitly through
//! [`PipelineConfig::segment_strategy`] or from the input's
//! characteristics via [`SegmentStrategyKind::select`].
//!
//! Every strategy returns fresh buffers; the input is never modified.

use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::cluster::{self, RgbF};
use crate::types::{Dimensions, Mask, PipelineConfig, PipelineError, ProcessedImage};

/// Selects which segmentation strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentStrategyKind {
    /// Use the source alpha channel: any non-zero alpha is foreground.
    AlphaChannel,
    /// Assume a black backdrop: non-black pixels and strong edges are
    /// foreground.
    EdgeHeuristic,
    /// Estimate the background colour from the image border and keep
    /// pixels that differ from it, plus strong edges.
    DominantColorCluster,
}

impl SegmentStrategyKind {
    /// Pick a strategy from the input characteristics: the alpha channel
    /// when the source carries one, background clustering otherwise.
    #[must_use]
    pub const fn select(has_alpha: bool) -> Self {
        if has_alpha {
            Self::AlphaChannel
        } else {
            Self::DominantColorCluster
        }
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AlphaChannel => "alpha-channel",
            Self::EdgeHeuristic => "edge-heuristic",
            Self::DominantColorCluster => "dominant-color-cluster",
        }
    }
}

/// Trait for segmentation strategies.
///
/// Input: an RGBA pixel buffer. Output: the processed copy (background
/// made transparent, foreground made opaque) and the binary mask.
pub trait Segmenter {
    /// Segment `pixels` into foreground and background.
    fn segment(&self, pixels: &RgbaImage, config: &PipelineConfig) -> Segmentation;
}

/// Buffers produced by a [`Segmenter`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Input copy with foreground alpha 255 and background alpha 0.
    pub processed: RgbaImage,
    /// Binary foreground mask.
    pub mask: Mask,
    /// Background colour estimate, when the strategy computes one.
    pub background: Option<RgbF>,
}

impl Segmenter for SegmentStrategyKind {
    fn segment(&self, pixels: &RgbaImage, config: &PipelineConfig) -> Segmentation {
        match *self {
            Self::AlphaChannel => segment_alpha(pixels),
            Self::EdgeHeuristic => {
                let edge_threshold = config.edge_threshold;
                let (processed, mask) = segment_interior(pixels, |pixels, x, y| {
                    let p = pixels.get_pixel(x, y).0;
                    edge_strength(pixels, x, y) > edge_threshold || p[..3].iter().any(|&c| c > 0)
                });
                Segmentation {
                    processed,
                    mask,
                    background: None,
                }
            }
            Self::DominantColorCluster => segment_dominant_color(pixels, config),
        }
    }
}

/// Segment `pixels` with the configured or automatically selected
/// strategy.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the buffer has a zero
/// dimension.
pub fn segment(
    pixels: &RgbaImage,
    has_alpha: bool,
    config: &PipelineConfig,
) -> Result<ProcessedImage, PipelineError> {
    let dimensions = Dimensions::of(pixels);
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image dimensions must be non-zero, got {}x{}",
            dimensions.width, dimensions.height
        )));
    }

    let strategy = config
        .segment_strategy
        .unwrap_or_else(|| SegmentStrategyKind::select(has_alpha));
    let Segmentation {
        processed,
        mask,
        background,
    } = strategy.segment(pixels, config);

    tracing::debug!(
        strategy = strategy.name(),
        foreground = mask.solid_count(),
        total = dimensions.pixel_count(),
        ?background,
        "segmented image"
    );

    Ok(ProcessedImage {
        processed,
        mask,
        dimensions,
        strategy,
    })
}

/// Edge strength at `(x, y)`: the larger of the summed absolute RGB
/// differences to the right and bottom neighbours.
///
/// The caller guarantees both neighbours exist.
#[must_use]
pub fn edge_strength(pixels: &RgbaImage, x: u32, y: u32) -> u32 {
    let here = pixels.get_pixel(x, y).0;
    let right = pixels.get_pixel(x + 1, y).0;
    let below = pixels.get_pixel(x, y + 1).0;
    let diff = |other: [u8; 4]| -> u32 {
        here[..3]
            .iter()
            .zip(&other[..3])
            .map(|(&a, &b)| u32::from(a.abs_diff(b)))
            .sum()
    };
    diff(right).max(diff(below))
}

/// Alpha-channel strategy: per pixel, alpha > 0 is foreground.
fn segment_alpha(pixels: &RgbaImage) -> Segmentation {
    let mut processed = pixels.clone();
    for pixel in processed.pixels_mut() {
        pixel.0[3] = if pixel.0[3] > 0 { 255 } else { 0 };
    }
    let mask = Mask::from_fn(pixels.width(), pixels.height(), |x, y| {
        pixels.get_pixel(x, y).0[3] > 0
    });
    Segmentation {
        processed,
        mask,
        background: None,
    }
}

/// Dominant-colour strategy: estimate the background from the border,
/// then keep pixels that differ from it or sit on a strong edge.
fn segment_dominant_color(pixels: &RgbaImage, config: &PipelineConfig) -> Segmentation {
    let mut rng = config
        .cluster_seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let background = cluster::estimate_background(
        pixels,
        config.cluster_count,
        config.cluster_convergence,
        &mut rng,
    );

    let Some(background) = background else {
        // Only reachable for an image with no border samples, which the
        // dimension check in `segment` already excludes.
        return Segmentation {
            processed: clear_alpha(pixels),
            mask: Mask::new(pixels.width(), pixels.height()),
            background: None,
        };
    };

    let tolerance = background_tolerance(background, config);
    let edge_threshold = config.edge_threshold;
    let (processed, mask) = segment_interior(pixels, |pixels, x, y| {
        let color = cluster::rgb_of(*pixels.get_pixel(x, y));
        cluster::rgb_distance(color, background) > tolerance
            || edge_strength(pixels, x, y) > edge_threshold
    });

    Segmentation {
        processed,
        mask,
        background: Some(background),
    }
}

/// Similarity tolerance for a background colour: tighter on light
/// backgrounds, looser on dark ones.
#[must_use]
pub fn background_tolerance(background: RgbF, config: &PipelineConfig) -> f64 {
    let intensity = (background[0] + background[1] + background[2]) / 3.0;
    if intensity > config.background_intensity_split {
        config.light_background_tolerance
    } else {
        config.dark_background_tolerance
    }
}

/// Copy of `pixels` with every alpha set to 0.
fn clear_alpha(pixels: &RgbaImage) -> RgbaImage {
    let mut out = pixels.clone();
    for pixel in out.pixels_mut() {
        pixel.0[3] = 0;
    }
    out
}

/// Classify interior pixels with `is_foreground`; the 1-pixel border is
/// background.
///
/// Foreground pixels keep their colour at full opacity; background
/// pixels keep their colour at zero alpha.
fn segment_interior(
    pixels: &RgbaImage,
    is_foreground: impl Fn(&RgbaImage, u32, u32) -> bool,
) -> (RgbaImage, Mask) {
    let (width, height) = pixels.dimensions();
    let mut processed = clear_alpha(pixels);
    let mut mask = Mask::new(width, height);

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            if is_foreground(pixels, x, y) {
                processed.get_pixel_mut(x, y).0[3] = 255;
                mask.set(x, y, true);
            }
        }
    }

    (processed, mask)
}
