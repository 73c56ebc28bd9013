//! Text rendering for certificate name labels.
//!
//! Uses a bundled DejaVu Sans so output does not depend on the fonts installed on
//! the host.

use crate::{
    error::{PhotoBoothError, Result},
    types::{NameLabel, PlacementRect},
};
use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::debug as trace_debug;

static FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

fn font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_DATA)
        .map_err(|e| PhotoBoothError::internal(format!("bundled font is unreadable: {}", e)))
}

/// Pixel box a label occupies on a canvas of the given size
///
/// # Errors
/// - `Internal` when the bundled font cannot be parsed
pub fn label_bounds(label: &NameLabel, canvas_width: u32, canvas_height: u32) -> Result<PlacementRect> {
    let font = font()?;
    let scale = PxScale::from(label.size_px(canvas_width));
    let (width, height) = measure(&font, scale, label.text.trim());
    Ok(bounds_for(label, canvas_width, canvas_height, width, height))
}

/// Advance width of `text` and the line height from ascent to descent
fn measure(font: &FontRef<'_>, scale: PxScale, text: &str) -> (u32, u32) {
    let (width, _) = text_size(scale, font, text);
    let line_height = font.as_scaled(scale).height().ceil().max(0.0) as u32;
    (width, line_height)
}

fn bounds_for(
    label: &NameLabel,
    canvas_width: u32,
    canvas_height: u32,
    text_width: u32,
    text_height: u32,
) -> PlacementRect {
    let x = (f64::from(canvas_width) * label.left).round() as i64;
    let bottom_edge = f64::from(canvas_height) * (1.0 - label.bottom);
    let y = (bottom_edge - f64::from(text_height)).round() as i64;
    PlacementRect::new(x, y, text_width, text_height)
}

/// Draw `label` onto `canvas`; blank text draws nothing.
///
/// Returns the box the text was laid out in.
///
/// # Errors
/// - `Internal` when the bundled font cannot be parsed
pub fn draw_label(canvas: &mut RgbaImage, label: &NameLabel) -> Result<Option<PlacementRect>> {
    let text = label.text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let font = font()?;
    let (canvas_width, canvas_height) = canvas.dimensions();
    let scale = PxScale::from(label.size_px(canvas_width));
    let (width, height) = measure(&font, scale, text);
    let bounds = bounds_for(label, canvas_width, canvas_height, width, height);
    trace_debug!(text, bounds = %bounds, "Drawing name label");

    let [r, g, b] = label.color;
    draw_text_mut(
        canvas,
        Rgba([r, g, b, 255]),
        bounds.x as i32,
        bounds.y as i32,
        scale,
        &font,
        text,
    );
    Ok(Some(bounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_font_parses() {
        assert!(font().is_ok());
    }

    #[test]
    fn test_label_drawn_inside_its_bounds() {
        let mut canvas = RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]));
        let bounds = draw_label(&mut canvas, &NameLabel::new("Ada Lovelace"))
            .unwrap()
            .unwrap();

        assert_eq!(bounds.x, 132);
        assert!(bounds.width > 0 && bounds.height > 0);
        assert!(bounds.y + i64::from(bounds.height) <= 258);

        let inked = canvas
            .enumerate_pixels()
            .filter(|(_, _, px)| px.0 != [255, 255, 255, 255])
            .map(|(x, y, _)| (i64::from(x), i64::from(y)))
            .collect::<Vec<_>>();
        let right = bounds.x + i64::from(bounds.width);
        let bottom = bounds.y + i64::from(bounds.height);
        assert!(inked
            .iter()
            .any(|&(x, y)| x >= bounds.x && x < right && y >= bounds.y && y < bottom));
        // Antialiasing and side bearings may spill slightly past the layout box
        let margin = 4;
        for (x, y) in inked {
            assert!(x >= bounds.x - margin && x <= right + margin, "ink at x={x}");
            assert!(y >= bounds.y - margin && y <= bottom + margin, "ink at y={y}");
        }
    }

    #[test]
    fn test_blank_label_draws_nothing() {
        let mut canvas = RgbaImage::from_pixel(50, 50, Rgba([1, 2, 3, 255]));
        assert!(draw_label(&mut canvas, &NameLabel::new("   ")).unwrap().is_none());
        assert!(canvas.pixels().all(|px| px.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn test_bounds_match_measurement() {
        let label = NameLabel::new("Grace");
        let measured = label_bounds(&label, 640, 480).unwrap();
        let mut canvas = RgbaImage::new(640, 480);
        let drawn = draw_label(&mut canvas, &label).unwrap().unwrap();
        assert_eq!(measured, drawn);
    }
}
