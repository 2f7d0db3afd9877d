//! spinform-export: Pure format serializers (sans-IO)
//!
//! Converts shape sets into preview formats. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, to_svg};
