//! Rendition transformer.
//!
//! Turns source image bytes into rendition bytes for one [`SizeSpec`].
//!
//! # Design Decisions
//!
//! - **Deterministic output**: the resize filter and encoder settings are fixed
//!   per transformer, so the same input always produces the same bytes.
//!
//! - **Format preserving**: JPEG stays JPEG, PNG stays PNG, WebP stays WebP
//!   (lossless). GIF and BMP sources are re-encoded as PNG.
//!
//! - **Original passthrough**: `SizeMode::Original` validates the header and
//!   returns the source bytes as-is instead of re-encoding.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::TransformError;

use super::catalog::{SizeMode, SizeSpec};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Resampling filter used for every resize.
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Formats accepted as sources.
const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

// =============================================================================
// Transformer Trait
// =============================================================================

/// Produces rendition bytes from source bytes.
///
/// Implementations must be pure: no caching, no I/O, same input same output.
/// Calls run on the blocking thread pool.
pub trait RenditionTransformer: Send + Sync + 'static {
    fn transform(&self, source: &[u8], spec: &SizeSpec) -> Result<Bytes, TransformError>;
}

// =============================================================================
// Image Transformer
// =============================================================================

/// Default transformer backed by the `image` crate.
///
/// # Example
///
/// ```ignore
/// use rendition_server::rendition::{ImageTransformer, RenditionTransformer, SizeSpec};
///
/// let transformer = ImageTransformer::new();
/// let thumb = transformer.transform(&source_bytes, &SizeSpec::crop("thumb", 100, 100))?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    jpeg_quality: u8,
}

impl ImageTransformer {
    /// Create a transformer with the default JPEG quality.
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Create a transformer with a fixed JPEG quality (clamped to 1-100).
    pub fn with_quality(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: clamp_quality(jpeg_quality),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Get image dimensions without fully decoding.
    pub fn dimensions(&self, source: &[u8]) -> Result<(u32, u32), TransformError> {
        let format = detect_format(source)?;
        ImageReader::with_format(Cursor::new(source), format)
            .into_dimensions()
            .map_err(|e| TransformError::DecodeError {
                message: e.to_string(),
            })
    }

    fn decode(&self, source: &[u8], format: ImageFormat) -> Result<DynamicImage, TransformError> {
        ImageReader::with_format(Cursor::new(source), format)
            .decode()
            .map_err(|e| TransformError::DecodeError {
                message: e.to_string(),
            })
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Bytes, TransformError> {
        let mut output = Vec::new();
        let encode_error = |e: image::ImageError| TransformError::EncodeError {
            message: e.to_string(),
        };

        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let img = match img {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
                    other => DynamicImage::ImageRgb8(other.to_rgb8()),
                };
                img.write_with_encoder(JpegEncoder::new_with_quality(
                    &mut output,
                    self.jpeg_quality,
                ))
                .map_err(encode_error)?;
            }
            ImageFormat::WebP => {
                let img = if img.color().has_alpha() {
                    DynamicImage::ImageRgba8(img.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                };
                img.write_with_encoder(WebPEncoder::new_lossless(&mut output))
                    .map_err(encode_error)?;
            }
            _ => {
                img.write_with_encoder(PngEncoder::new(&mut output))
                    .map_err(encode_error)?;
            }
        }

        Ok(Bytes::from(output))
    }
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenditionTransformer for ImageTransformer {
    fn transform(&self, source: &[u8], spec: &SizeSpec) -> Result<Bytes, TransformError> {
        let format = detect_format(source)?;

        let resized = match spec.mode {
            SizeMode::Original => {
                self.dimensions(source)?;
                return Ok(Bytes::copy_from_slice(source));
            }
            SizeMode::Fit { width, height } => {
                let img = self.decode(source, format)?;
                if img.width() <= width && img.height() <= height {
                    img
                } else {
                    img.resize(width, height, RESIZE_FILTER)
                }
            }
            SizeMode::Crop { width, height } => {
                let img = self.decode(source, format)?;
                img.resize_to_fill(width, height, RESIZE_FILTER)
            }
        };

        self.encode(&resized, output_format(format))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Detect a supported source format from magic bytes.
pub fn detect_format(source: &[u8]) -> Result<ImageFormat, TransformError> {
    let format = image::guess_format(source).map_err(|_| TransformError::UnsupportedFormat {
        reason: "unrecognized image data".to_string(),
    })?;

    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(TransformError::UnsupportedFormat {
            reason: format!("{:?} images are not supported", format),
        });
    }

    Ok(format)
}

/// Format a rendition is encoded in, given its source format.
pub fn output_format(source: ImageFormat) -> ImageFormat {
    match source {
        ImageFormat::Jpeg => ImageFormat::Jpeg,
        ImageFormat::WebP => ImageFormat::WebP,
        _ => ImageFormat::Png,
    }
}

/// MIME type of encoded image bytes, sniffed from the header.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
