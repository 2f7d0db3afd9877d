//! Boundary types handed to the geometry/render collaborator.
//!
//! The renderer consumes a [`ShapeSet`]: normalized polygons plus the
//! [`ShapeStyle`] to extrude them with. When no polygon survived the
//! pipeline (or the trace failed), the set carries a default flat square
//! instead so the renderer always has something to draw.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeSpace;
use crate::types::{Point, Polygon};

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// White.
    pub const WHITE: Self = Self([255, 255, 255]);
}

/// Error returned when a colour string is not `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    /// The string does not start with `#`.
    #[error("not a hex color: {0:?}")]
    MissingHash(String),

    /// The hex part is neither 3 nor 6 digits long.
    #[error("unexpected hex length: {0:?}")]
    InvalidLength(String),

    /// The hex part contains a non-hex character.
    #[error("invalid hex color: {0:?}")]
    InvalidDigit(String),
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    /// Parse `#rrggbb` or the short form `#rgb`. Surrounding whitespace
    /// is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_owned()))?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(s.to_owned()));
        }

        let channel = |digits: &str| {
            u8::from_str_radix(digits, 16).map_err(|_| ColorParseError::InvalidDigit(s.to_owned()))
        };
        match hex.len() {
            3 => {
                // #rgb expands to #rrggbb.
                let mut rgb = [0_u8; 3];
                for (slot, i) in rgb.iter_mut().zip(0..3) {
                    *slot = channel(&hex[i..=i])? * 17;
                }
                Ok(Self(rgb))
            }
            6 => Ok(Self([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ])),
            _ => Err(ColorParseError::InvalidLength(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// How the renderer should draw the shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeStyle {
    /// Fill colour of the extruded faces.
    pub fill: Rgb,
    /// Extrusion depth in normalized units.
    pub extrusion_depth: f64,
}

impl ShapeStyle {
    /// Default extrusion depth.
    pub const DEFAULT_EXTRUSION_DEPTH: f64 = 0.2;
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: Rgb::WHITE,
            extrusion_depth: Self::DEFAULT_EXTRUSION_DEPTH,
        }
    }
}

/// Polygons plus style, ready for the geometry builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSet {
    /// Normalized, closed polygons. Never empty.
    pub polygons: Vec<Polygon>,
    /// Drawing style.
    pub style: ShapeStyle,
    /// Coordinate space of `polygons`.
    pub space: NormalizeSpace,
    /// `true` when `polygons` holds the default flat shape rather than
    /// traced outlines.
    pub is_fallback: bool,
}

impl ShapeSet {
    /// Wrap traced polygons. An empty list is replaced by the default
    /// flat shape.
    #[must_use]
    pub fn new(polygons: Vec<Polygon>, style: ShapeStyle, space: NormalizeSpace) -> Self {
        if polygons.is_empty() {
            tracing::debug!("no polygons to render, using the default flat shape");
            return Self::fallback(style, space);
        }
        Self {
            polygons,
            style,
            space,
            is_fallback: false,
        }
    }

    /// The default flat shape: one closed square covering the canonical
    /// extent of `space`.
    #[must_use]
    pub fn fallback(style: ShapeStyle, space: NormalizeSpace) -> Self {
        let (min, max) = space.extent();
        let square = Polygon::new(vec![
            Point::new(min.x, min.y),
            Point::new(max.x, min.y),
            Point::new(max.x, max.y),
            Point::new(min.x, max.y),
            Point::new(min.x, min.y),
        ]);
        Self {
            polygons: vec![square],
            style,
            space,
            is_fallback: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_long_form() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb([255, 128, 0]));
        assert_eq!(" #1A1a1a ".parse::<Rgb>().unwrap(), Rgb([26, 26, 26]));
    }

    #[test]
    fn parse_short_form() {
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("#f80".parse::<Rgb>().unwrap(), Rgb([255, 136, 0]));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "ffffff".parse::<Rgb>(),
            Err(ColorParseError::MissingHash(_))
        ));
        assert!(matches!(
            "#ffff".parse::<Rgb>(),
            Err(ColorParseError::InvalidLength(_))
        ));
        assert!(matches!(
            "#gg0000".parse::<Rgb>(),
            Err(ColorParseError::InvalidDigit(_))
        ));
        assert!(matches!(
            "#ffé".parse::<Rgb>(),
            Err(ColorParseError::InvalidDigit(_))
        ));
    }

    #[test]
    fn display_round_trips() {
        let color = Rgb([1, 2, 254]);
        assert_eq!(color.to_string(), "#0102fe");
        assert_eq!(color.to_string().parse::<Rgb>().unwrap(), color);
    }

    #[test]
    fn style_defaults() {
        let style = ShapeStyle::default();
        assert_eq!(style.fill, Rgb::WHITE);
        assert!((style.extrusion_depth - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn style_serializes_color_as_hex() {
        let json = serde_json::to_string(&ShapeStyle::default()).unwrap();
        assert!(json.contains("\"#ffffff\""), "got {json}");
        let back: ShapeStyle = serde_json::from_str(r##"{"fill": "#102030"}"##).unwrap();
        assert_eq!(back.fill, Rgb([16, 32, 48]));
        assert!((back.extrusion_depth - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_polygons_fall_back_to_flat_square() {
        let set = ShapeSet::new(Vec::new(), ShapeStyle::default(), NormalizeSpace::UnitSquare);
        assert!(set.is_fallback);
        assert_eq!(set.polygons.len(), 1);
        let square = &set.polygons[0];
        assert!(square.is_closed());
        assert_eq!(square.len(), 5);
        assert_eq!(square.points()[2], Point::new(1.0, 1.0));
    }

    #[test]
    fn fallback_follows_space() {
        let set = ShapeSet::fallback(ShapeStyle::default(), NormalizeSpace::Centered);
        assert_eq!(set.polygons[0].points()[0], Point::new(-1.0, -1.0));
    }

    #[test]
    fn traced_polygons_are_kept() {
        let triangle = Polygon::new(vec![
            Point::new(0.1, 0.1),
            Point::new(0.9, 0.1),
            Point::new(0.5, 0.9),
            Point::new(0.1, 0.1),
        ]);
        let set = ShapeSet::new(
            vec![triangle.clone()],
            ShapeStyle::default(),
            NormalizeSpace::UnitSquare,
        );
        assert!(!set.is_fallback);
        assert_eq!(set.polygons, vec![triangle]);
    }
}
