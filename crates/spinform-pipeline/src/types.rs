//! Shared types for the spinform outline pipeline.

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeSpace;
use crate::segment::SegmentStrategyKind;

/// Re-export `RgbaImage` so downstream crates can pass pixel buffers
/// without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point.
///
/// Image-space points count pixels from the top-left corner; normalized
/// points follow the +Y-up convention of [`crate::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Direction of travel from `self` to `other`, in radians.
    #[must_use]
    pub fn heading_to(self, other: Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl From<PixelCoord> for Point {
    fn from(p: PixelCoord) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelCoord {
    /// Column, counted from the left edge.
    pub x: u32,
    /// Row, counted from the top edge.
    pub y: u32,
}

impl PixelCoord {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The 8-connected neighbours of this pixel that fall inside a
    /// `width` x `height` image.
    pub fn neighbors(self, width: u32, height: u32) -> impl Iterator<Item = Self> {
        NEIGHBOR_OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let x = self.x.checked_add_signed(dx)?;
            let y = self.y.checked_add_signed(dy)?;
            (x < width && y < height).then_some(Self::new(x, y))
        })
    }
}

/// Offsets of the 8 neighbours around a pixel, row by row.
pub(crate) const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// An ordered sequence of points forming one traced outline.
///
/// Polygons produced by [`crate::outline::trace`] are closed: the last
/// point repeats the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a new polygon from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points, including the closing point.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns `true` if the polygon has at least two points and the last
    /// point equals the first.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.len() >= 2 && self.0.first() == self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// The shorter of width and height, as `f64`.
    #[must_use]
    pub fn shorter_dim(self) -> f64 {
        f64::from(self.width.min(self.height))
    }
}

/// Binary foreground/background classification stored as RGBA.
///
/// Every pixel is either `[255, 255, 255, 255]` (solid foreground) or
/// `[0, 0, 0, 0]` (transparent background). The RGBA storage keeps the
/// mask interchangeable with ordinary pixel buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(RgbaImage);

/// Pixel value of a solid mask pixel.
pub const MASK_SOLID: image::Rgba<u8> = image::Rgba([255, 255, 255, 255]);

/// Pixel value of a transparent mask pixel.
pub const MASK_CLEAR: image::Rgba<u8> = image::Rgba([0, 0, 0, 0]);

impl Mask {
    /// An all-transparent mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self(RgbaImage::new(width, height))
    }

    /// Build a mask from a per-pixel predicate.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut solid: impl FnMut(u32, u32) -> bool) -> Self {
        Self(RgbaImage::from_fn(width, height, |x, y| {
            if solid(x, y) { MASK_SOLID } else { MASK_CLEAR }
        }))
    }

    /// Binarize an arbitrary RGBA image: a pixel is solid when its alpha
    /// exceeds `alpha_threshold`.
    #[must_use]
    pub fn from_rgba(image: &RgbaImage, alpha_threshold: u8) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[3] > alpha_threshold
        })
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Whether the pixel at `(x, y)` is foreground. Out-of-bounds
    /// coordinates are background.
    #[must_use]
    pub fn is_solid(&self, x: i64, y: i64) -> bool {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return false;
        };
        x < self.width() && y < self.height() && self.0.get_pixel(x, y).0[3] == 255
    }

    /// Mark a pixel as foreground or background.
    pub fn set(&mut self, x: u32, y: u32, solid: bool) {
        self.0
            .put_pixel(x, y, if solid { MASK_SOLID } else { MASK_CLEAR });
    }

    /// Number of solid pixels.
    #[must_use]
    pub fn solid_count(&self) -> u64 {
        self.0
            .pixels()
            .map(|p| u64::from(u8::from(p.0[3] == 255)))
            .sum()
    }

    /// Borrow the underlying RGBA image.
    #[must_use]
    pub const fn as_rgba(&self) -> &RgbaImage {
        &self.0
    }

    /// Consume the mask, returning the underlying RGBA image.
    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        self.0
    }
}

/// Configuration for the outline pipeline.
///
/// Every tunable is a named field with a matching `DEFAULT_*` constant.
/// Call [`validate`](Self::validate) before running the pipeline with
/// user-supplied values; [`crate::process`] does this automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Forces a segmentation strategy. `None` picks one from the input:
    /// alpha channel when present, dominant-colour clustering otherwise.
    pub segment_strategy: Option<SegmentStrategyKind>,

    /// Alpha cutoff used when binarizing a caller-supplied RGBA mask via
    /// [`Mask::from_rgba`]: a pixel is solid when alpha exceeds this value.
    pub alpha_threshold: u8,

    /// Edge strength (sum of absolute RGB differences to the right or
    /// bottom neighbour) above which a pixel is kept as foreground even
    /// when it matches the background colour.
    pub edge_threshold: u32,

    /// RGB distance within which a pixel counts as background when the
    /// estimated background is light.
    pub light_background_tolerance: f64,

    /// RGB distance within which a pixel counts as background when the
    /// estimated background is dark. Looser, since compression noise is
    /// more visible on dark colours.
    pub dark_background_tolerance: f64,

    /// Mean RGB intensity above which the background counts as light.
    pub background_intensity_split: f64,

    /// Number of k-means clusters used to estimate the background colour.
    pub cluster_count: usize,

    /// Clustering stops once every centroid moves less than this RGB
    /// distance between iterations.
    pub cluster_convergence: f64,

    /// Seed for the clustering RNG. `None` seeds from system entropy, so
    /// ambiguous backgrounds may segment differently between runs.
    pub cluster_seed: Option<u64>,

    /// Components with fewer solid pixels than this are discarded as noise.
    pub min_shape_size: usize,

    /// Minimum number of non-solid 8-neighbours that makes a solid pixel
    /// an outline pixel. 1 keeps thin features; 2 suppresses single-pixel
    /// spurs.
    pub boundary_neighbor_threshold: u8,

    /// Search radius (pixels) for the next outline point.
    pub max_neighbor_distance: f64,

    /// Wider search radius (pixels) used when nothing lies within
    /// `max_neighbor_distance`.
    pub fallback_distance: f64,

    /// Largest allowed turn (radians) between consecutive steps of the
    /// outline walk.
    pub max_turn_angle: f64,

    /// Candidates whose turn angle is within this many radians of the best
    /// candidate are ranked by distance instead.
    pub angle_tie_tolerance: f64,

    /// How far each point moves toward the midpoint of its neighbours
    /// (0.0 disables smoothing).
    pub smoothing_factor: f64,

    /// Heading change (radians) that keeps a point during simplification.
    pub simplify_angle_threshold: f64,

    /// Distance (pixels) from the last kept point that keeps a point
    /// during simplification.
    pub simplify_distance_threshold: f64,

    /// Output coordinate space for the polygons.
    pub normalize_space: NormalizeSpace,

    /// Largest accepted image width or height, enforced when decoding.
    pub max_dimension: u32,
}

impl PipelineConfig {
    /// Default alpha cutoff for caller-supplied masks.
    pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;
    /// Default edge strength threshold.
    pub const DEFAULT_EDGE_THRESHOLD: u32 = 30;
    /// Default background tolerance for light backgrounds.
    pub const DEFAULT_LIGHT_BACKGROUND_TOLERANCE: f64 = 30.0;
    /// Default background tolerance for dark backgrounds.
    pub const DEFAULT_DARK_BACKGROUND_TOLERANCE: f64 = 50.0;
    /// Default light/dark intensity split.
    pub const DEFAULT_BACKGROUND_INTENSITY_SPLIT: f64 = 128.0;
    /// Default k-means cluster count.
    pub const DEFAULT_CLUSTER_COUNT: usize = 3;
    /// Default k-means convergence distance.
    pub const DEFAULT_CLUSTER_CONVERGENCE: f64 = 1.0;
    /// Default minimum component area.
    pub const DEFAULT_MIN_SHAPE_SIZE: usize = 5;
    /// Default outline neighbour threshold (strict variant).
    pub const DEFAULT_BOUNDARY_NEIGHBOR_THRESHOLD: u8 = 2;
    /// Default outline search radius.
    pub const DEFAULT_MAX_NEIGHBOR_DISTANCE: f64 = 3.0;
    /// Default fallback search radius.
    pub const DEFAULT_FALLBACK_DISTANCE: f64 = 6.0;
    /// Default maximum turn angle (162 degrees).
    pub const DEFAULT_MAX_TURN_ANGLE: f64 = std::f64::consts::PI * 0.9;
    /// Default angle tie tolerance.
    pub const DEFAULT_ANGLE_TIE_TOLERANCE: f64 = 0.5;
    /// Default smoothing factor.
    pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.3;
    /// Default simplification angle threshold.
    pub const DEFAULT_SIMPLIFY_ANGLE_THRESHOLD: f64 = 0.05;
    /// Default simplification distance threshold.
    pub const DEFAULT_SIMPLIFY_DISTANCE_THRESHOLD: f64 = 2.0;
    /// Default maximum image dimension.
    pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn check(ok: bool, msg: &str) -> Result<(), PipelineError> {
            if ok {
                Ok(())
            } else {
                Err(PipelineError::InvalidConfig(msg.to_string()))
            }
        }

        check(
            (1..=8).contains(&self.boundary_neighbor_threshold),
            "boundary_neighbor_threshold must be between 1 and 8",
        )?;
        check(
            self.max_neighbor_distance >= 1.0,
            "max_neighbor_distance must be at least 1.0",
        )?;
        check(
            self.fallback_distance >= self.max_neighbor_distance,
            "fallback_distance must be at least max_neighbor_distance",
        )?;
        check(
            self.max_turn_angle > 0.0 && self.max_turn_angle <= std::f64::consts::PI,
            "max_turn_angle must be in (0, pi]",
        )?;
        check(
            self.angle_tie_tolerance >= 0.0,
            "angle_tie_tolerance must be non-negative",
        )?;
        check(
            (0.0..=1.0).contains(&self.smoothing_factor),
            "smoothing_factor must be in [0, 1]",
        )?;
        check(
            self.simplify_angle_threshold >= 0.0,
            "simplify_angle_threshold must be non-negative",
        )?;
        check(
            self.simplify_distance_threshold >= 0.0,
            "simplify_distance_threshold must be non-negative",
        )?;
        check(self.cluster_count >= 1, "cluster_count must be at least 1")?;
        check(
            self.cluster_convergence > 0.0,
            "cluster_convergence must be positive",
        )?;
        check(
            self.light_background_tolerance >= 0.0 && self.dark_background_tolerance >= 0.0,
            "background tolerances must be non-negative",
        )?;
        check(self.max_dimension >= 1, "max_dimension must be at least 1")?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_strategy: None,
            alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            light_background_tolerance: Self::DEFAULT_LIGHT_BACKGROUND_TOLERANCE,
            dark_background_tolerance: Self::DEFAULT_DARK_BACKGROUND_TOLERANCE,
            background_intensity_split: Self::DEFAULT_BACKGROUND_INTENSITY_SPLIT,
            cluster_count: Self::DEFAULT_CLUSTER_COUNT,
            cluster_convergence: Self::DEFAULT_CLUSTER_CONVERGENCE,
            cluster_seed: None,
            min_shape_size: Self::DEFAULT_MIN_SHAPE_SIZE,
            boundary_neighbor_threshold: Self::DEFAULT_BOUNDARY_NEIGHBOR_THRESHOLD,
            max_neighbor_distance: Self::DEFAULT_MAX_NEIGHBOR_DISTANCE,
            fallback_distance: Self::DEFAULT_FALLBACK_DISTANCE,
            max_turn_angle: Self::DEFAULT_MAX_TURN_ANGLE,
            angle_tie_tolerance: Self::DEFAULT_ANGLE_TIE_TOLERANCE,
            smoothing_factor: Self::DEFAULT_SMOOTHING_FACTOR,
            simplify_angle_threshold: Self::DEFAULT_SIMPLIFY_ANGLE_THRESHOLD,
            simplify_distance_threshold: Self::DEFAULT_SIMPLIFY_DISTANCE_THRESHOLD,
            normalize_space: NormalizeSpace::default(),
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Output of the segmentation stage.
///
/// Created once per input image and replaced wholesale on the next one.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Copy of the input with background pixels made transparent and
    /// foreground pixels made fully opaque.
    pub processed: RgbaImage,
    /// Binary foreground mask.
    pub mask: Mask,
    /// Image dimensions in pixels.
    pub dimensions: Dimensions,
    /// Strategy that produced the mask.
    pub strategy: SegmentStrategyKind,
}

/// Result of running the full pipeline.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Segmentation output handed to the renderer as texture and mask.
    pub image: ProcessedImage,
    /// One closed, normalized polygon per retained component. Empty when
    /// no foreground survived, which is not an error.
    pub polygons: Vec<Polygon>,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image has unusable dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
