//! Image decoding for callers that start from encoded bytes.
//!
//! The core stages operate on decoded RGBA buffers. This module is the
//! caller-side helper that turns PNG, JPEG, BMP, or WebP bytes into one,
//! enforcing the size bounds before the core ever sees the image.
//!
//! Dimensions are read from the image header and checked before any
//! pixel data is decoded, so an oversized image is refused without
//! allocating its buffer.

use std::io::Cursor;

use image::{ImageReader, Limits, RgbaImage};

use crate::types::{Dimensions, PipelineError};

/// A decoded image ready for segmentation.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Decoded pixels, converted to RGBA.
    pub pixels: RgbaImage,
    /// Whether the source format carried an alpha channel. Drives the
    /// automatic segmentation strategy choice.
    pub has_alpha: bool,
}

impl DecodedImage {
    /// Dimensions of the decoded image.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.pixels)
    }
}

/// Largest accepted encoded input, in bytes (10 MiB).
pub const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Decode raw image bytes into RGBA.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::InvalidImage`] if `bytes` is larger than
/// [`MAX_INPUT_BYTES`], or if either dimension is zero or exceeds
/// `max_dimension`.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8], max_dimension: u32) -> Result<DecodedImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    if bytes.len() > MAX_INPUT_BYTES {
        return Err(PipelineError::InvalidImage(format!(
            "encoded image must not exceed {MAX_INPUT_BYTES} bytes, got {}",
            bytes.len()
        )));
    }

    let (width, height) = reader(bytes)?.into_dimensions()?;
    check_dimensions(Dimensions { width, height }, max_dimension)?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    let mut decoder = reader(bytes)?;
    decoder.limits(limits);

    let img = decoder.decode()?;
    let has_alpha = img.color().has_alpha();
    let pixels = img.to_rgba8();

    tracing::debug!(
        width = pixels.width(),
        height = pixels.height(),
        has_alpha,
        "decoded image"
    );

    Ok(DecodedImage { pixels, has_alpha })
}

/// A reader over `bytes` with the format sniffed from its content.
fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, PipelineError> {
    Ok(ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?)
}

/// Reject images with a zero dimension or one larger than `max_dimension`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] describing the offending size.
pub fn check_dimensions(dimensions: Dimensions, max_dimension: u32) -> Result<(), PipelineError> {
    let Dimensions { width, height } = dimensions;
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    if width > max_dimension || height > max_dimension {
        return Err(PipelineError::InvalidImage(format!(
            "image dimensions must not exceed {max_dimension}x{max_dimension}, got {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
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

    fn encode_rgb_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[], 4096);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01], 4096);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn rgba_png_reports_alpha() {
        let img = RgbaImage::from_pixel(17, 31, image::Rgba([128, 64, 32, 255]));
        let decoded = decode(&encode_png(&img), 4096).unwrap();
        assert!(decoded.has_alpha);
        assert_eq!(
            decoded.dimensions(),
            Dimensions {
                width: 17,
                height: 31
            }
        );
        assert_eq!(decoded.pixels.get_pixel(3, 3).0, [128, 64, 32, 255]);
    }

    #[test]
    fn rgb_png_reports_no_alpha() {
        let decoded = decode(&encode_rgb_png(4, 4), 4096).unwrap();
        assert!(!decoded.has_alpha);
        assert_eq!(decoded.pixels.get_pixel(0, 0).0, [200, 10, 10, 255]);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let bytes = encode_rgb_png(20, 8);
        let result = decode(&bytes, 16);
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn oversized_image_is_rejected_from_its_header() {
        let bytes = encode_rgb_png(20, 8);
        let result = decode(&bytes, 16);
        assert!(
            matches!(result, Err(PipelineError::InvalidImage(ref msg)) if msg.contains("20x8")),
            "got {result:?}"
        );
    }

    #[test]
    fn oversized_input_bytes_are_rejected() {
        let bytes = vec![0u8; MAX_INPUT_BYTES + 1];
        let result = decode(&bytes, 4096);
        assert!(matches!(result, Err(PipelineError::InvalidImage(ref msg)) if msg.contains("bytes")));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let result = check_dimensions(
            Dimensions {
                width: 0,
                height: 10,
            },
            4096,
        );
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn bound_is_inclusive() {
        let dims = Dimensions {
            width: 4096,
            height: 4096,
        };
        assert!(check_dimensions(dims, 4096).is_ok());
    }
}
