//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records how long each took and what it
//! produced. The crate has no time source of its own; callers supply a
//! [`Clock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::label::label_with_stats;
use crate::normalize::normalize_polygons;
use crate::outline::trace_detailed;
use crate::refine::refine;
use crate::segment::segment;
use crate::types::{PipelineConfig, PipelineError, Polygon, ProcessResult, RgbaImage};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Foreground segmentation.
    pub segmentation: StageDiagnostics,
    /// Connected-component labelling.
    pub labeling: StageDiagnostics,
    /// Outline tracing, all components.
    pub tracing: StageDiagnostics,
    /// Smoothing and simplification, all polygons.
    pub refinement: StageDiagnostics,
    /// Coordinate normalization.
    pub normalization: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Segmentation metrics.
    Segmentation {
        /// Strategy that produced the mask.
        strategy: String,
        /// Number of foreground pixels.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Labelling metrics.
    Labeling {
        /// Minimum retained component area.
        min_shape_size: usize,
        /// Components retained.
        component_count: usize,
        /// Components discarded as noise.
        discarded_count: usize,
        /// Area of the largest retained component.
        largest_area: usize,
    },
    /// Outline tracing metrics.
    Tracing {
        /// Components that produced a polygon.
        traced_count: usize,
        /// Components dropped as degenerate.
        degenerate_count: usize,
        /// Boundary pixels across all components.
        boundary_points: usize,
        /// Boundary pixels the walks visited.
        visited_points: usize,
    },
    /// Refinement metrics.
    Refinement {
        /// Smoothing factor applied.
        smoothing_factor: f64,
        /// Total points before refinement.
        points_before: usize,
        /// Total points after refinement.
        points_after: usize,
        /// `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Normalization metrics.
    Normalization {
        /// Target coordinate space.
        space: String,
        /// Polygons normalized.
        polygon_count: usize,
    },
}

/// High-level summary counts for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Polygons in the final output.
    pub polygon_count: usize,
    /// Points across all final polygons.
    pub final_point_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Polygons: {}  |  Final points: {}",
            self.summary.polygon_count, self.summary.final_point_count,
        ));

        lines.join("\n")
    }

    /// Stages in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Segmentation", &self.segmentation),
            ("Labeling", &self.labeling),
            ("Tracing", &self.tracing),
            ("Refinement", &self.refinement),
            ("Normalization", &self.normalization),
        ]
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Segmentation {
            strategy,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("{strategy} fg={foreground_pixels} ({coverage:.1}%)")
        }
        StageMetrics::Labeling {
            min_shape_size,
            component_count,
            discarded_count,
            largest_area,
        } => format!(
            "{component_count} kept, {discarded_count} < {min_shape_size}px dropped, largest={largest_area}px"
        ),
        StageMetrics::Tracing {
            traced_count,
            degenerate_count,
            boundary_points,
            visited_points,
        } => format!(
            "{traced_count} traced, {degenerate_count} degenerate, visited {visited_points}/{boundary_points} boundary px"
        ),
        StageMetrics::Refinement {
            smoothing_factor,
            points_before,
            points_after,
            reduction_ratio,
        } => format!(
            "smooth={smoothing_factor:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
        StageMetrics::Normalization {
            space,
            polygon_count,
        } => format!("{space} {polygon_count} polygons"),
    }
}

fn total_points(polygons: &[Polygon]) -> usize {
    polygons.iter().map(Polygon::len).sum()
}

/// Run the pipeline on decoded pixels, collecting per-stage diagnostics.
///
/// Produces the same [`ProcessResult`] as [`process`](crate::process).
///
/// # Errors
///
/// Same as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    pixels: &RgbaImage,
    has_alpha: bool,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    crate::validate_input(pixels, config)?;

    // Segmentation.
    let t = clock.now();
    let image = segment(pixels, has_alpha, config)?;
    let segmentation = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Segmentation {
            strategy: image.strategy.name().to_owned(),
            foreground_pixels: image.mask.solid_count(),
            total_pixels: image.dimensions.pixel_count(),
        },
    };

    // Labeling.
    let t = clock.now();
    let labels = label_with_stats(&image.mask, config.min_shape_size);
    let labeling = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Labeling {
            min_shape_size: config.min_shape_size,
            component_count: labels.components.len(),
            discarded_count: labels.discarded,
            largest_area: labels
                .components
                .iter()
                .map(crate::label::Component::area)
                .max()
                .unwrap_or(0),
        },
    };

    // Tracing.
    let t = clock.now();
    let traces: Vec<_> = labels
        .components
        .iter()
        .map(|c| trace_detailed(c, &image.mask, config))
        .collect();
    let boundary_points = traces.iter().map(|tr| tr.boundary_points).sum();
    let visited_points = traces.iter().map(|tr| tr.visited_points).sum();
    let raw: Vec<Polygon> = traces.into_iter().filter_map(|tr| tr.polygon).collect();
    let tracing = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Tracing {
            traced_count: raw.len(),
            degenerate_count: labels.components.len() - raw.len(),
            boundary_points,
            visited_points,
        },
    };

    // Refinement.
    let t = clock.now();
    let points_before = total_points(&raw);
    let refined: Vec<Polygon> = raw.iter().map(|p| refine(p, config)).collect();
    let points_after = total_points(&refined);
    #[allow(clippy::cast_precision_loss)]
    let reduction_ratio = if points_before > 0 {
        1.0 - points_after as f64 / points_before as f64
    } else {
        0.0
    };
    let refinement = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Refinement {
            smoothing_factor: config.smoothing_factor,
            points_before,
            points_after,
            reduction_ratio,
        },
    };

    // Normalization.
    let t = clock.now();
    let polygons = normalize_polygons(refined, image.dimensions, config.normalize_space);
    let normalization = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Normalization {
            space: format!("{:?}", config.normalize_space),
            polygon_count: polygons.len(),
        },
    };

    let summary = PipelineSummary {
        image_width: image.dimensions.width,
        image_height: image.dimensions.height,
        pixel_count: image.dimensions.pixel_count(),
        polygon_count: polygons.len(),
        final_point_count: total_points(&polygons),
    };

    let diagnostics = PipelineDiagnostics {
        segmentation,
        labeling,
        tracing,
        refinement,
        normalization,
        total_duration: clock.elapsed(&start),
        summary,
    };

    Ok((ProcessResult { image, polygons }, diagnostics))
}
