//! Core types shared by the loader, compositor, chroma key filter and uploader

use crate::{
    config::OutputFormat,
    error::{PhotoBoothError, Result},
    services::OutputFormatHandler,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decoded RGBA8 pixel buffer, row-major, 4 bytes per pixel.
///
/// The buffer length always equals `width * height * 4`. A `Raster` is never
/// mutated in place by the pipeline; operations return a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    /// Wrap an existing RGBA image
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Convert any decoded image to RGBA8
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
        }
    }

    /// Build a raster from raw RGBA bytes
    ///
    /// # Errors
    /// - Buffer length does not match `width * height * 4`
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        RgbaImage::from_raw(width, height, pixels)
            .map(Self::from_image)
            .ok_or_else(|| {
                PhotoBoothError::decode(format!(
                    "RGBA buffer of {} bytes does not match {}x{} (expected {} bytes)",
                    actual, width, height, expected
                ))
            })
    }

    /// Solid-color raster, mostly useful for fixtures
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// True when either dimension is zero
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Raw RGBA bytes
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// RGBA value at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width() && y < self.height()).then(|| self.image.get_pixel(x, y).0)
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Where the captured photo is drawn within a template's pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PlacementRect {
    #[must_use]
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reject zero-sized placements
    ///
    /// # Errors
    /// - Width or height is zero
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PhotoBoothError::composition_stage_error(
                "placement",
                "placement rectangle has zero area",
                Some(&format!("{}x{}", self.width, self.height)),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PlacementRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Normalized crop-origin bias for cover fitting; 0.5/0.5 is a center crop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

impl Anchor {
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both components clamped to `[0, 1]`; NaN collapses to the center
    #[must_use]
    pub fn clamped(self) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
        Self {
            x: clamp(self.x),
            y: clamp(self.y),
        }
    }
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Monotonically increasing identity of a produced composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultToken(pub u64);

impl ResultToken {
    /// Next token of this process; strictly greater than every earlier one
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inputs of a single composition.
///
/// Rasters are shared, so rebuilding a request with a different placement or
/// anchor does not copy pixel data. Every request, rebuilt ones included, takes a
/// fresh [`ResultToken`] when it is created, so results order by request time
/// regardless of when their composition finishes.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub template: Arc<Raster>,
    pub captured: Arc<Raster>,
    pub placement: PlacementRect,
    pub anchor: Anchor,
    pub token: ResultToken,
}

impl CompositeRequest {
    #[must_use]
    pub fn new(template: Arc<Raster>, captured: Arc<Raster>, placement: PlacementRect) -> Self {
        Self {
            template,
            captured,
            placement,
            anchor: Anchor::CENTER,
            token: ResultToken::next(),
        }
    }

    /// Same rasters, new placement
    #[must_use]
    pub fn with_placement(&self, placement: PlacementRect) -> Self {
        Self {
            placement,
            token: ResultToken::next(),
            ..self.clone()
        }
    }

    /// Same rasters, new anchor
    #[must_use]
    pub fn with_anchor(&self, anchor: Anchor) -> Self {
        Self {
            anchor,
            token: ResultToken::next(),
            ..self.clone()
        }
    }
}

/// Final encoded raster produced by the composite engine.
///
/// Cheap to clone; the encoded bytes are shared. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    token: ResultToken,
    encoded: Arc<[u8]>,
    format: OutputFormat,
    dimensions: (u32, u32),
    placement: PlacementRect,
    anchor: Anchor,
    content_id: String,
    created_at: DateTime<Utc>,
}

impl CompositeResult {
    #[must_use]
    pub fn new(
        token: ResultToken,
        encoded: Vec<u8>,
        format: OutputFormat,
        dimensions: (u32, u32),
        placement: PlacementRect,
        anchor: Anchor,
    ) -> Self {
        let content_id = Self::hash_content(&encoded);
        Self {
            token,
            encoded: Arc::from(encoded),
            format,
            dimensions,
            placement,
            anchor,
            content_id,
            created_at: Utc::now(),
        }
    }

    fn hash_content(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[must_use]
    pub fn token(&self) -> ResultToken {
        self.token
    }

    /// Encoded image bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.encoded
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    #[must_use]
    pub fn placement(&self) -> PlacementRect {
        self.placement
    }

    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Hex SHA-256 of the encoded bytes
    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `data:` URL of the encoded bytes
    #[must_use]
    pub fn to_data_url(&self) -> String {
        OutputFormatHandler::to_data_url(self.bytes(), self.format)
    }
}

/// Box for an overlay, expressed as fractions of the frame size.
///
/// `left` and `bottom` are offsets from the frame's left and bottom edges. When
/// `center_on_left` is set the box is shifted left by half its own width, so `left`
/// names the box center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPlacement {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
    pub center_on_left: bool,
}

impl Default for OverlayPlacement {
    fn default() -> Self {
        Self {
            left: 0.20,
            bottom: 0.27,
            width: 0.50,
            height: 0.60,
            center_on_left: true,
        }
    }
}

impl OverlayPlacement {
    /// Resolve to a pixel box inside a frame of the given size
    #[must_use]
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> (f64, f64, f64, f64) {
        let fw = f64::from(frame_width);
        let fh = f64::from(frame_height);
        let w = fw * self.width;
        let h = fh * self.height;
        let mut x = fw * self.left;
        if self.center_on_left {
            x -= w / 2.0;
        }
        let y = fh - fh * self.bottom - h;
        (x, y, w, h)
    }
}

/// Smallest glyph height of a name label, in pixels
pub const MIN_NAME_SIZE_PX: f64 = 10.0;

/// Guest name printed on a certificate.
///
/// Position and size are fractions of the frame: `left` is the text's left edge,
/// `bottom` the distance of its bottom edge from the frame's bottom, and `size` the
/// glyph height relative to the frame width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameLabel {
    pub text: String,
    pub left: f64,
    pub bottom: f64,
    pub size: f64,
    pub color: [u8; 3],
}

impl NameLabel {
    #[must_use]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            left: 0.33,
            bottom: 0.14,
            size: 0.028,
            color: [0x37, 0x41, 0x51],
        }
    }

    /// Glyph height in pixels for a frame of the given width
    #[must_use]
    pub fn size_px(&self, frame_width: u32) -> f32 {
        (f64::from(frame_width) * self.size).max(MIN_NAME_SIZE_PX) as f32
    }
}
