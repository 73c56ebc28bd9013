//! Fit geometry for drawing a source raster into a destination rectangle.
//!
//! [`CoverFitProjector::project`] computes the sub-rectangle of the source that,
//! stretched over the whole destination, fills it without distortion (CSS
//! `object-fit: cover`). The overflow is cropped around the anchor.
//! [`CoverFitProjector::contain`] is the letterboxing counterpart used for overlays.

use crate::types::Anchor;

/// Ratios closer to 1 than this count as "no correction applied yet"
const PARITY_EPSILON: f64 = 1e-14;

/// Fractional rectangle inside the source raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceCropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Whole-pixel crop rectangle, always inside the source bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceCropRect {
    /// Snap to whole pixels inside a `source_w` x `source_h` raster.
    ///
    /// The result is at least 1x1 and never extends past the source edges.
    #[must_use]
    pub fn to_pixel_rect(&self, source_w: u32, source_h: u32) -> PixelRect {
        let snap = |origin: f64, extent: f64, limit: u32| {
            let limit_f = f64::from(limit);
            let start = origin.round().clamp(0.0, (limit_f - 1.0).max(0.0));
            let size = extent.round().clamp(1.0, (limit_f - start).max(1.0));
            (start as u32, size as u32)
        };
        let (x, width) = snap(self.x, self.width, source_w);
        let (y, height) = snap(self.y, self.height, source_h);
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Destination rectangle of a contain fit, relative to the destination box origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Pure geometry, no state
pub struct CoverFitProjector;

impl CoverFitProjector {
    /// Source crop for a cover fit of `source_w x source_h` into `dest_w x dest_h`.
    ///
    /// All dimensions must be positive; that is the caller's responsibility.
    ///
    /// ```rust
    /// use photo_booth::{Anchor, CoverFitProjector};
    ///
    /// // 4:3 source into a 1:1 box keeps the full height and crops the sides.
    /// let crop = CoverFitProjector::project(400.0, 300.0, 100.0, 100.0, Anchor::CENTER);
    /// assert!((crop.width - 300.0).abs() < 1e-9);
    /// assert!((crop.height - 300.0).abs() < 1e-9);
    /// assert!((crop.x - 50.0).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn project(
        source_w: f64,
        source_h: f64,
        dest_w: f64,
        dest_h: f64,
        anchor: Anchor,
    ) -> SourceCropRect {
        let anchor = anchor.clamped();

        let scale = (dest_w / source_w).min(dest_h / source_h);
        let mut scaled_w = source_w * scale;
        let mut scaled_h = source_h * scale;

        // Only one axis is corrected: width first, height only if width was at parity.
        let mut ratio = 1.0;
        if scaled_w < dest_w {
            ratio = dest_w / scaled_w;
        }
        if (ratio - 1.0).abs() < PARITY_EPSILON && scaled_h < dest_h {
            ratio = dest_h / scaled_h;
        }
        scaled_w *= ratio;
        scaled_h *= ratio;

        let mut crop_w = source_w / (scaled_w / dest_w);
        let mut crop_h = source_h / (scaled_h / dest_h);

        let crop_x = ((source_w - crop_w) * anchor.x).max(0.0);
        let crop_y = ((source_h - crop_h) * anchor.y).max(0.0);
        crop_w = crop_w.min(source_w);
        crop_h = crop_h.min(source_h);

        SourceCropRect {
            x: crop_x,
            y: crop_y,
            width: crop_w,
            height: crop_h,
        }
    }

    /// Letterboxed placement of `source_w x source_h` centred in `dest_w x dest_h`
    #[must_use]
    pub fn contain(source_w: f64, source_h: f64, dest_w: f64, dest_h: f64) -> ContainRect {
        let scale = (dest_w / source_w).min(dest_h / source_h);
        let width = source_w * scale;
        let height = source_h * scale;
        ContainRect {
            x: (dest_w - width) / 2.0,
            y: (dest_h - height) / 2.0,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_same_aspect_is_full_source() {
        let crop = CoverFitProjector::project(800.0, 600.0, 400.0, 300.0, Anchor::CENTER);
        assert_close(crop.x, 0.0);
        assert_close(crop.y, 0.0);
        assert_close(crop.width, 800.0);
        assert_close(crop.height, 600.0);
    }

    #[test]
    fn test_landscape_into_portrait_placement() {
        // 1600x1200 capture into the standard 720x880 slot:
        // scale = 0.45 -> 720x540, height corrected by 880/540.
        let crop = CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::CENTER);
        let expected_w = 1600.0 / ((720.0 * (880.0 / 540.0)) / 720.0);
        assert_close(crop.width, expected_w);
        assert_close(crop.height, 1200.0);
        assert_close(crop.x, (1600.0 - expected_w) * 0.5);
        assert_close(crop.y, 0.0);
    }

    #[test]
    fn test_anchor_biases_crop_origin() {
        let left = CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::new(0.0, 0.5));
        let right =
            CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::new(1.0, 0.5));
        assert_close(left.x, 0.0);
        assert_close(right.x + right.width, 1600.0);
    }

    #[test]
    fn test_out_of_range_anchor_is_clamped() {
        let clamped =
            CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::new(7.0, -2.0));
        let edge = CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::new(1.0, 0.0));
        assert_eq!(clamped, edge);
    }

    #[test]
    fn test_crop_inside_source_for_many_shapes() {
        let sources = [(1600.0, 1200.0), (1200.0, 1600.0), (50.0, 50.0), (3.0, 1000.0)];
        let dests = [(720.0, 880.0), (2000.0, 100.0), (10.0, 10.0), (999.0, 1001.0)];
        let anchors = [Anchor::new(0.0, 0.0), Anchor::CENTER, Anchor::new(1.0, 1.0)];
        for (sw, sh) in sources {
            for (dw, dh) in dests {
                for anchor in anchors {
                    let crop = CoverFitProjector::project(sw, sh, dw, dh, anchor);
                    assert!(crop.x >= 0.0 && crop.y >= 0.0);
                    assert!(crop.width > 0.0 && crop.height > 0.0);
                    assert!(crop.x + crop.width <= sw + 1e-6, "{sw}x{sh} -> {dw}x{dh}");
                    assert!(crop.y + crop.height <= sh + 1e-6, "{sw}x{sh} -> {dw}x{dh}");
                }
            }
        }
    }

    #[test]
    fn test_crop_preserves_destination_aspect() {
        let crop = CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::CENTER);
        assert_close(crop.width / crop.height, 720.0 / 880.0);
    }

    #[test]
    fn test_pixel_rect_snapping() {
        let crop = CoverFitProjector::project(1600.0, 1200.0, 720.0, 880.0, Anchor::CENTER);
        let px = crop.to_pixel_rect(1600, 1200);
        assert_eq!(px.y, 0);
        assert_eq!(px.height, 1200);
        assert_eq!(px.x, 309);
        assert_eq!(px.width, 982);
        assert!(px.x + px.width <= 1600);
    }

    #[test]
    fn test_pixel_rect_never_empty() {
        let crop = SourceCropRect {
            x: 9.7,
            y: 0.0,
            width: 0.2,
            height: 0.2,
        };
        let px = crop.to_pixel_rect(10, 10);
        assert_eq!((px.x, px.width), (9, 1));
        assert_eq!(px.height, 1);
    }

    #[test]
    fn test_contain_letterboxes() {
        let rect = CoverFitProjector::contain(400.0, 200.0, 100.0, 100.0);
        assert_close(rect.width, 100.0);
        assert_close(rect.height, 50.0);
        assert_close(rect.x, 0.0);
        assert_close(rect.y, 25.0);
    }
}
