//! Output format handling service
//!
//! Encoding of flattened rasters and the small amount of format metadata
//! (extensions, MIME types, data URLs) the export collaborators need.

use crate::{config::OutputFormat, error::Result, types::Raster};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Service for encoding rasters and describing output formats
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode a raster into the given format.
    ///
    /// PNG keeps the alpha channel and is lossless. JPEG drops alpha.
    pub fn encode(raster: &Raster, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => {
                raster
                    .as_image()
                    .write_to(&mut cursor, ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(raster.as_image().clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality);
                encoder.encode_image(&rgb)?;
            },
        }
        Ok(buffer)
    }

    /// MIME type for a format
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// File extension for a format (without the dot)
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        matches!(format, OutputFormat::Png)
    }

    /// Build a base64 `data:` URL
    #[must_use]
    pub fn to_data_url(bytes: &[u8], format: OutputFormat) -> String {
        format!(
            "data:{};base64,{}",
            Self::mime_type(format),
            STANDARD.encode(bytes)
        )
    }

    /// Split a base64 `data:` URL into its MIME type and decoded payload.
    ///
    /// Returns `None` for anything that is not a base64 data URL.
    #[must_use]
    pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
        let rest = url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime = meta.strip_suffix(";base64")?;
        let bytes = STANDARD.decode(payload.trim()).ok()?;
        Some((mime.to_string(), bytes))
    }
}
