//! spinform-bench: CLI tool for outline pipeline experimentation and diagnostics.
//!
//! Runs the outline pipeline on a given image file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Comparing segmentation strategies on logos with and without alpha
//! - Tuning the outline walk (search radius, turn limit, tie band)
//! - Measuring per-stage durations to identify bottlenecks
//! - Writing the resulting shape set as JSON or an SVG preview
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin spinform-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use spinform_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use spinform_pipeline::{
    Mask, NormalizeSpace, PipelineConfig, Polygon, Rgb, SegmentStrategyKind, ShapeSet, ShapeStyle,
};
use spinform_worker::ShapeWorker;

/// Outline pipeline experimentation and diagnostics for spinform.
///
/// Runs the pipeline on a given image with configurable parameters and
/// prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "spinform-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Segmentation strategy.
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    strategy: Strategy,

    /// Alpha threshold used when re-binarizing the mask for the worker.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ALPHA_THRESHOLD)]
    alpha_threshold: u8,

    /// Edge strength above which a pixel counts as foreground.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: u32,

    /// Background colour distance tolerance on light backgrounds.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LIGHT_BACKGROUND_TOLERANCE)]
    light_background_tolerance: f64,

    /// Background colour distance tolerance on dark backgrounds.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DARK_BACKGROUND_TOLERANCE)]
    dark_background_tolerance: f64,

    /// Number of k-means clusters for background estimation.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_COUNT)]
    cluster_count: usize,

    /// Seed for k-means initialization (random when omitted).
    #[arg(long)]
    seed: Option<u64>,

    /// Minimum component area in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_SHAPE_SIZE)]
    min_shape_size: usize,

    /// Non-solid neighbours needed for a boundary pixel (1 = loose, 2 = strict).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BOUNDARY_NEIGHBOR_THRESHOLD, value_parser = clap::value_parser!(u8).range(1..=8))]
    boundary_neighbor_threshold: u8,

    /// Outline walk search radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_NEIGHBOR_DISTANCE)]
    max_neighbor_distance: f64,

    /// Outline walk fallback search radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_FALLBACK_DISTANCE)]
    fallback_distance: f64,

    /// Largest allowed turn between walk steps, in radians.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_TURN_ANGLE)]
    max_turn_angle: f64,

    /// Turn-angle band treated as a tie, in radians.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ANGLE_TIE_TOLERANCE)]
    angle_tie_tolerance: f64,

    /// Smoothing factor (0 disables smoothing).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SMOOTHING_FACTOR)]
    smoothing_factor: f64,

    /// Simplification angle threshold in radians.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_ANGLE_THRESHOLD)]
    simplify_angle_threshold: f64,

    /// Simplification distance threshold in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_DISTANCE_THRESHOLD)]
    simplify_distance_threshold: f64,

    /// Normalized coordinate space.
    #[arg(long, value_enum, default_value_t = Space::Unit)]
    space: Space,

    /// Largest accepted image width or height.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Fill colour for the shape set (`#rrggbb`).
    #[arg(long, default_value = "#ffffff")]
    fill: Rgb,

    /// Extrusion depth for the shape set.
    #[arg(long, default_value_t = ShapeStyle::DEFAULT_EXTRUSION_DEPTH)]
    depth: f64,

    /// Trace on the background worker instead of the calling thread.
    #[arg(long)]
    worker: bool,

    /// Seconds to wait for the background worker.
    #[arg(long, default_value_t = 30)]
    worker_timeout: u64,

    /// Write the shape set as JSON to file.
    #[arg(long)]
    polygons: Option<PathBuf>,

    /// Write an SVG preview to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

/// Segmentation strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Alpha channel when the image has one, colour clustering otherwise.
    Auto,
    /// Non-zero alpha is foreground.
    Alpha,
    /// Non-black pixels and strong edges are foreground.
    Edge,
    /// Pixels unlike the dominant border colour are foreground.
    Cluster,
}

/// Normalized space selection.
#[derive(Clone, Copy, ValueEnum)]
enum Space {
    /// `[0, 1] × [0, 1]`, origin bottom-left.
    Unit,
    /// Origin at the centre, shorter side spans `[-1, 1]`.
    Centered,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        segment_strategy: match cli.strategy {
            Strategy::Auto => None,
            Strategy::Alpha => Some(SegmentStrategyKind::AlphaChannel),
            Strategy::Edge => Some(SegmentStrategyKind::EdgeHeuristic),
            Strategy::Cluster => Some(SegmentStrategyKind::DominantColorCluster),
        },
        alpha_threshold: cli.alpha_threshold,
        edge_threshold: cli.edge_threshold,
        light_background_tolerance: cli.light_background_tolerance,
        dark_background_tolerance: cli.dark_background_tolerance,
        cluster_count: cli.cluster_count,
        cluster_seed: cli.seed,
        min_shape_size: cli.min_shape_size,
        boundary_neighbor_threshold: cli.boundary_neighbor_threshold,
        max_neighbor_distance: cli.max_neighbor_distance,
        fallback_distance: cli.fallback_distance,
        max_turn_angle: cli.max_turn_angle,
        angle_tie_tolerance: cli.angle_tie_tolerance,
        smoothing_factor: cli.smoothing_factor,
        simplify_angle_threshold: cli.simplify_angle_threshold,
        simplify_distance_threshold: cli.simplify_distance_threshold,
        normalize_space: match cli.space {
            Space::Unit => NormalizeSpace::UnitSquare,
            Space::Centered => NormalizeSpace::Centered,
        },
        max_dimension: cli.max_dimension,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli).and_then(|c| {
        c.validate().map_err(|e| e.to_string())?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let decoded = match spinform_pipeline::decode::decode(&image_bytes, config.max_dimension) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{}, alpha: {})",
        cli.image_path.display(),
        image_bytes.len(),
        decoded.pixels.width(),
        decoded.pixels.height(),
        decoded.has_alpha,
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut first_result = None;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match spinform_pipeline::diagnostics::process_with_diagnostics(
            &decoded.pixels,
            decoded.has_alpha,
            &config,
            &StdClock,
        ) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if first_result.is_none() {
                    first_result = Some(result);
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(result) = first_result else {
        return ExitCode::FAILURE;
    };

    let polygons = if cli.worker {
        let mask = Mask::from_rgba(&result.image.processed, config.alpha_threshold);
        trace_on_worker(
            mask,
            &config,
            Duration::from_secs(cli.worker_timeout),
            &result.polygons,
        )
    } else {
        Some(result.polygons)
    };

    let style = ShapeStyle {
        fill: cli.fill,
        extrusion_depth: cli.depth,
    };
    let shape_set = polygons.map_or_else(
        || ShapeSet::fallback(style, config.normalize_space),
        |p| ShapeSet::new(p, style, config.normalize_space),
    );
    if shape_set.is_fallback {
        tracing::info!("no outline traced, using the default flat shape");
    }

    let mut ok = true;
    if let Some(ref path) = cli.polygons {
        ok &= write_polygons(path, &shape_set);
    }
    if let Some(ref path) = cli.svg {
        ok &= write_svg(path, &cli.image_path, &config, &shape_set);
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run trace + refine on the shared background worker.
///
/// Returns `None` on worker failure so the caller can fall back to the
/// flat shape.
fn trace_on_worker(
    mask: Mask,
    config: &PipelineConfig,
    timeout: Duration,
    synchronous: &[Polygon],
) -> Option<Vec<Polygon>> {
    let outcome = ShapeWorker::shared()
        .and_then(|worker| worker.submit(mask, config.clone()))
        .and_then(|pending| pending.wait_timeout(timeout));

    match outcome {
        Ok(polygons) => {
            if polygons != synchronous {
                tracing::warn!(
                    worker = polygons.len(),
                    synchronous = synchronous.len(),
                    "worker result differs from the synchronous run"
                );
            }
            Some(polygons)
        }
        Err(e) => {
            tracing::warn!(error = %e, "background trace failed");
            None
        }
    }
}

fn write_polygons(path: &Path, shape_set: &ShapeSet) -> bool {
    let json = match serde_json::to_string_pretty(shape_set) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing shape set: {e}");
            return false;
        }
    };
    match std::fs::write(path, &json) {
        Ok(()) => {
            eprintln!(
                "Shape set written to {} ({} polygons)",
                path.display(),
                shape_set.polygons.len(),
            );
            true
        }
        Err(e) => {
            eprintln!("Error writing shape set to {}: {e}", path.display());
            false
        }
    }
}

fn write_svg(path: &Path, image_path: &Path, config: &PipelineConfig, shape_set: &ShapeSet) -> bool {
    let title = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!("{config:#?}");
    let metadata = spinform_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
    };
    let svg = spinform_export::to_svg(shape_set, &metadata);
    match std::fs::write(path, &svg) {
        Ok(()) => {
            eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len());
            true
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", path.display());
            false
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    let stage_count = all_diagnostics[0].stages().len();
    for i in 0..stage_count {
        let name = all_diagnostics[0].stages()[i].0;
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| d.stages()[i].1.duration.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }

    let counts: Vec<usize> = all_diagnostics
        .iter()
        .map(|d| d.summary.polygon_count)
        .collect();
    if counts.windows(2).any(|w| w[0] != w[1]) {
        println!();
        println!("Polygon count varied across runs: {counts:?} (unseeded clustering?)");
    }
}
