//! Green-screen removal for overlay assets.
//!
//! Classification is a fixed per-pixel rule on the raw RGB channels (see
//! [`ChromaKeyPolicy::is_background`]). Background pixels get alpha 0; every other
//! pixel keeps all four channels, including its original alpha.

use crate::{
    config::ChromaKeyPolicy,
    error::Result,
    services::RasterLoader,
    types::Raster,
};
use tracing::{debug as trace_debug, instrument};

/// Stateless filter around a [`ChromaKeyPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromaKeyFilter {
    policy: ChromaKeyPolicy,
}

impl ChromaKeyFilter {
    #[must_use]
    pub fn new(policy: ChromaKeyPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ChromaKeyPolicy {
        &self.policy
    }

    /// Return a copy of `input` with background pixels made fully transparent.
    ///
    /// Total for any raster, including an empty one.
    #[must_use]
    #[instrument(skip(self, input), fields(dimensions = %format!("{}x{}", input.width(), input.height())))]
    pub fn remove_background(&self, input: &Raster) -> Raster {
        let mut image = input.as_image().clone();
        let mut keyed = 0usize;
        for px in image.chunks_exact_mut(4) {
            if self.policy.is_background(px[0], px[1], px[2]) {
                px[3] = 0;
                keyed += 1;
            }
        }
        trace_debug!(keyed_pixels = keyed, "Chroma key applied");
        Raster::from_image(image)
    }

    /// Decode encoded bytes and key them.
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a supported image
    pub fn remove_background_from_bytes(&self, bytes: &[u8]) -> Result<Raster> {
        let raster = RasterLoader::decode_bytes(bytes)?;
        Ok(self.remove_background(&raster))
    }

    /// Produce an overlay asset, falling back to the untouched upload when the
    /// bytes cannot be decoded.
    #[must_use]
    pub fn extract_overlay(&self, bytes: Vec<u8>, name: impl Into<String>) -> OverlayAsset {
        let name = name.into();
        match self.remove_background_from_bytes(&bytes) {
            Ok(raster) => OverlayAsset {
                name,
                source: OverlaySource::Keyed(raster),
            },
            Err(e) => {
                log::warn!(
                    "Background removal failed for '{}', using original upload: {}",
                    name,
                    e.user_message()
                );
                OverlayAsset {
                    name,
                    source: OverlaySource::Original(bytes),
                }
            },
        }
    }
}

/// Pixels of an overlay asset
#[derive(Debug, Clone)]
pub enum OverlaySource {
    /// Decoded and keyed successfully
    Keyed(Raster),
    /// Keying failed; the bytes are exactly what was uploaded
    Original(Vec<u8>),
}

/// Named overlay handed to downstream composition
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    pub name: String,
    pub source: OverlaySource,
}

impl OverlayAsset {
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self.source, OverlaySource::Keyed(_))
    }

    /// Raster for drawing. Original bytes are decoded as-is.
    ///
    /// # Errors
    /// - `Decode` when an original upload is not a decodable image either
    pub fn raster(&self) -> Result<Raster> {
        match &self.source {
            OverlaySource::Keyed(raster) => Ok(raster.clone()),
            OverlaySource::Original(bytes) => RasterLoader::decode_bytes(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OutputFormat, services::OutputFormatHandler};

    fn single(rgba: [u8; 4]) -> Raster {
        Raster::filled(1, 1, rgba)
    }

    #[test]
    fn test_pure_green_becomes_transparent() {
        let out = ChromaKeyFilter::default().remove_background(&single([0, 255, 0, 255]));
        assert_eq!(out.pixel(0, 0), Some([0, 255, 0, 0]));
    }

    #[test]
    fn test_non_background_untouched() {
        let filter = ChromaKeyFilter::default();
        for rgba in [[255, 0, 0, 255], [0, 90, 0, 255], [100, 120, 0, 128]] {
            assert_eq!(filter.remove_background(&single(rgba)).pixel(0, 0), Some(rgba));
        }
    }

    #[test]
    fn test_dominance_boundary() {
        let filter = ChromaKeyFilter::default();
        // 121 > 100 * 1.2 keys, 120 does not
        assert_eq!(
            filter.remove_background(&single([100, 121, 0, 255])).pixel(0, 0),
            Some([100, 121, 0, 0])
        );
        assert_eq!(
            filter.remove_background(&single([100, 120, 0, 255])).pixel(0, 0),
            Some([100, 120, 0, 255])
        );
    }

    #[test]
    fn test_input_not_mutated() {
        let input = single([0, 255, 0, 255]);
        let _ = ChromaKeyFilter::default().remove_background(&input);
        assert_eq!(input.pixel(0, 0), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_custom_policy() {
        let filter = ChromaKeyFilter::new(ChromaKeyPolicy {
            min_green: 50,
            dominance: 1.0,
        });
        let out = filter.remove_background(&single([0, 90, 0, 255]));
        assert_eq!(out.pixel(0, 0), Some([0, 90, 0, 0]));
    }

    #[test]
    fn test_extract_overlay_keys_decodable_bytes() {
        let png = OutputFormatHandler::encode(
            &Raster::filled(2, 2, [0, 255, 0, 255]),
            OutputFormat::Png,
            90,
        )
        .unwrap();
        let asset = ChromaKeyFilter::default().extract_overlay(png, "award.png");
        assert!(asset.is_keyed());
        assert_eq!(asset.raster().unwrap().pixel(1, 1), Some([0, 255, 0, 0]));
    }

    #[test]
    fn test_extract_overlay_falls_back_to_original() {
        let garbage = b"definitely not an image".to_vec();
        let asset = ChromaKeyFilter::default().extract_overlay(garbage.clone(), "broken.png");
        assert!(!asset.is_keyed());
        match asset.source {
            OverlaySource::Original(bytes) => assert_eq!(bytes, garbage),
            OverlaySource::Keyed(_) => panic!("expected original bytes"),
        }
    }
}
