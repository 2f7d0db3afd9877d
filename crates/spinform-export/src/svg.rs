//! SVG preview serializer.
//!
//! Renders a [`ShapeSet`] as filled `<path>` elements so the traced
//! outlines can be inspected without the 3D renderer. Uses the [`svg`]
//! crate for document construction, XML escaping, and path data
//! formatting.
//!
//! Normalized geometry is +Y-up; SVG is +Y-down, so the Y axis is
//! flipped back here at the export boundary. Each polygon is its own
//! `<path>`, so a polygon traced inside another (a separate component in
//! a hole) is painted solid on top of it. `fill-rule="evenodd"` only
//! affects a single self-intersecting outline.
//!
//! This is a pure function with no I/O: it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Group, Path, Title};
use svg::node::{Text, Value};

use spinform_pipeline::{Point, Polygon, ShapeSet};

/// Length of the longer side of the document, in user units.
const DOCUMENT_SIZE: f64 = 512.0;

/// Metadata to embed in the SVG document.
///
/// When present, a `<title>` and/or `<desc>` element is emitted
/// immediately after the opening `<svg>` tag. Text values are
/// XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, typically the source image file stem.
    pub title: Option<&'a str>,
    /// Document description, typically the pipeline parameters.
    pub description: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polygon.
///
/// Emits `M` for the first point, `L` for the rest, and closes the path.
/// The repeated closing point of a closed polygon is not emitted twice.
/// Returns an empty string when fewer than three distinct points remain.
///
/// # Examples
///
/// ```
/// use spinform_pipeline::{Point, Polygon};
/// use spinform_export::build_path_data;
///
/// let triangle = Polygon::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 0.0),
///     Point::new(5.0, 8.0),
///     Point::new(0.0, 0.0),
/// ]);
/// let d = build_path_data(&triangle);
/// assert!(d.starts_with("M0,0 L10,0 L5,8"));
/// ```
#[must_use]
pub fn build_path_data(polygon: &Polygon) -> String {
    build_path_data_with(polygon, |p| (p.x, p.y))
}

fn build_path_data_with(polygon: &Polygon, map: impl Fn(&Point) -> (f64, f64)) -> String {
    let points = polygon.points();
    let ring = if polygon.is_closed() {
        &points[..points.len() - 1]
    } else {
        points
    };
    if ring.len() < 3 {
        return String::new();
    }

    let mut data = Data::new().move_to(map(&ring[0]));
    for p in &ring[1..] {
        data = data.line_to(map(p));
    }
    String::from(Value::from(data.close()))
}

/// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
type Bounds = (f64, f64, f64, f64);

/// The canonical extent of the set's space, grown to cover every point.
fn bounds(shape_set: &ShapeSet) -> Bounds {
    let (lo, hi) = shape_set.space.extent();
    shape_set
        .polygons
        .iter()
        .flat_map(Polygon::points)
        .fold((lo.x, lo.y, hi.x, hi.y), |(x0, y0, x1, y1), p| {
            (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
        })
}

/// Serialize a shape set into a standalone SVG document.
///
/// One filled `<path>` per polygon, grouped under a `<g>` that carries
/// the fill colour and the extrusion depth (as `data-extrusion-depth`).
/// Polygons with fewer than three distinct points are skipped.
#[must_use]
pub fn to_svg(shape_set: &ShapeSet, metadata: &SvgMetadata<'_>) -> String {
    let (x0, y0, x1, y1) = bounds(shape_set);
    let span = (x1 - x0).max(y1 - y0);
    let scale = if span > 0.0 { DOCUMENT_SIZE / span } else { 1.0 };
    let width = (x1 - x0) * scale;
    let height = (y1 - y0) * scale;

    // Flip +Y-up geometry into +Y-down SVG space.
    let to_view = |p: &Point| ((p.x - x0) * scale, (y1 - p.y) * scale);

    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    let mut group = Group::new()
        .set("fill", shape_set.style.fill.to_string())
        .set("fill-rule", "evenodd")
        .set("stroke", "none")
        .set("data-extrusion-depth", shape_set.style.extrusion_depth);
    if shape_set.is_fallback {
        group = group.set("data-fallback", "true");
    }

    for polygon in &shape_set.polygons {
        let d = build_path_data_with(polygon, to_view);
        if d.is_empty() {
            continue;
        }
        group = group.add(Path::new().set("d", d));
    }
    doc = doc.add(group);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
