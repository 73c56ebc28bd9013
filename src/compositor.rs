//! Layer flattening: captured photo under a template, or an overlay over a frame.
//!
//! Every call is a full recomposition from the inputs; nothing is cached between
//! calls, so identical inputs produce byte-identical output.

use crate::{
    config::CompositionConfig,
    error::{PhotoBoothError, Result},
    lettering,
    projector::CoverFitProjector,
    services::{
        CompositionStage, NoOpProgressReporter, OutputFormatHandler, ProgressReporter,
        ProgressTracker, RasterLoader, RasterSource,
    },
    types::{
        Anchor, CompositeRequest, CompositeResult, NameLabel, OverlayPlacement, PlacementRect,
        Raster, ResultToken,
    },
};
use image::{imageops, Rgba, RgbaImage};
use std::sync::Arc;
use tracing::{debug as trace_debug, info as trace_info, instrument, span, Level};

/// Stroke color of the calibration outline
const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Stroke width of the calibration outline, centred on the placement edge
const OUTLINE_WIDTH: i64 = 5;

/// Flattens layers into encoded results
pub struct CompositeEngine {
    config: CompositionConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl CompositeEngine {
    /// Create an engine with a validated configuration
    ///
    /// # Errors
    /// - Configuration validation failure
    pub fn new(config: CompositionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Report stages of [`compose_sources`](Self::compose_sources) to `reporter`
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// Draw `captured` cover-fitted into `placement`, then `template` on top.
    ///
    /// The output has the template's dimensions. Opaque template pixels hide the
    /// photo; transparent ones reveal it. The result token is taken on entry.
    ///
    /// # Errors
    /// - `Composition` when either raster has zero area or the placement is empty
    /// - `Image` when encoding fails
    pub fn compose(
        &self,
        template: &Raster,
        captured: &Raster,
        placement: PlacementRect,
        anchor: Anchor,
    ) -> Result<CompositeResult> {
        let token = ResultToken::next();
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        self.compose_tracked(token, template, captured, placement, anchor, &mut tracker)
    }

    /// [`compose`](Self::compose) for a prepared request; the result carries the
    /// request's token
    ///
    /// # Errors
    /// - Same as [`compose`](Self::compose)
    pub fn compose_request(&self, request: &CompositeRequest) -> Result<CompositeResult> {
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        self.compose_tracked(
            request.token,
            &request.template,
            &request.captured,
            request.placement,
            request.anchor,
            &mut tracker,
        )
    }

    /// Load the template, then the capture, and compose them.
    ///
    /// The result token is taken before the first load, so when several calls
    /// overlap, the one requested last carries the greatest token even if an
    /// earlier one finishes after it.
    ///
    /// # Errors
    /// - `Composition` when either source fails to load or decode
    /// - Same as [`compose`](Self::compose)
    pub async fn compose_sources(
        &self,
        loader: &RasterLoader,
        template: &RasterSource,
        captured: &RasterSource,
        placement: PlacementRect,
        anchor: Anchor,
    ) -> Result<CompositeResult> {
        let token = ResultToken::next();
        let mut tracker = ProgressTracker::new(self.reporter.clone());

        tracker.report_stage(CompositionStage::TemplateLoading);
        let template = Self::load_stage(&tracker, loader, template, "template loading").await?;

        tracker.report_stage(CompositionStage::CaptureLoading);
        let captured = Self::load_stage(&tracker, loader, captured, "capture loading").await?;

        self.compose_tracked(token, &template, &captured, placement, anchor, &mut tracker)
    }

    #[instrument(
        skip_all,
        fields(
            token = %token,
            template = %format!("{}x{}", template.width(), template.height()),
            captured = %format!("{}x{}", captured.width(), captured.height()),
            placement = %placement
        )
    )]
    fn compose_tracked(
        &self,
        token: ResultToken,
        template: &Raster,
        captured: &Raster,
        placement: PlacementRect,
        anchor: Anchor,
        tracker: &mut ProgressTracker,
    ) -> Result<CompositeResult> {
        let result = self
            .flatten_tracked(template, captured, placement, anchor, tracker)
            .and_then(|canvas| {
                tracker.report_stage(CompositionStage::Encoding);
                self.finish(token, canvas, placement, anchor)
            });
        match &result {
            Ok(_) => {
                tracker.report_stage(CompositionStage::Completed);
                trace_info!(elapsed_ms = tracker.elapsed_ms(), "Composition finished");
            },
            Err(e) => tracker.report_error(&e.user_message()),
        }
        result
    }

    async fn load_stage(
        tracker: &ProgressTracker,
        loader: &RasterLoader,
        source: &RasterSource,
        stage: &str,
    ) -> Result<Raster> {
        loader.load(source).await.map_err(|e| {
            tracker.report_error(&e.user_message());
            PhotoBoothError::composition_stage_error(
                stage,
                &e.user_message(),
                Some(&source.describe()),
            )
        })
    }

    /// Draw `overlay` contain-fitted into a box of `frame` and encode.
    ///
    /// The frame is drawn unscaled over a background fill, then the optional name
    /// label, then the overlay on top.
    ///
    /// # Errors
    /// - `Composition` when either raster has zero area or the box resolves to nothing
    /// - `Internal` when the label font cannot be loaded
    /// - `Image` when encoding fails
    #[instrument(skip(self, frame, overlay, label))]
    pub fn compose_overlay(
        &self,
        frame: &Raster,
        overlay: &Raster,
        placement: OverlayPlacement,
        label: Option<&NameLabel>,
    ) -> Result<CompositeResult> {
        let token = ResultToken::next();
        Self::ensure_not_empty("frame", frame)?;
        Self::ensure_not_empty("overlay", overlay)?;

        let (box_x, box_y, box_w, box_h) = placement.resolve(frame.width(), frame.height());
        if !(box_w > 0.0 && box_h > 0.0) {
            return Err(PhotoBoothError::composition_stage_error(
                "overlay placement",
                "overlay box has zero area",
                Some(&format!("{:.1}x{:.1}", box_w, box_h)),
            ));
        }

        let fit = CoverFitProjector::contain(
            f64::from(overlay.width()),
            f64::from(overlay.height()),
            box_w,
            box_h,
        );
        let width = fit.width.round().max(1.0) as u32;
        let height = fit.height.round().max(1.0) as u32;
        let dest_x = (box_x + fit.x).round() as i64;
        let dest_y = (box_y + fit.y).round() as i64;

        let mut canvas = self.blank_canvas(frame.width(), frame.height());
        imageops::overlay(&mut canvas, frame.as_image(), 0, 0);
        if let Some(label) = label {
            lettering::draw_label(&mut canvas, label)?;
        }
        let scaled = imageops::resize(overlay.as_image(), width, height, self.config.resample.into());
        imageops::overlay(&mut canvas, &scaled, dest_x, dest_y);

        let rect = PlacementRect::new(dest_x, dest_y, width, height);
        self.finish(token, canvas, rect, Anchor::CENTER)
    }

    /// Flatten without encoding
    ///
    /// # Errors
    /// - `Composition` when either raster has zero area or the placement is empty
    pub fn flatten(
        &self,
        template: &Raster,
        captured: &Raster,
        placement: PlacementRect,
        anchor: Anchor,
    ) -> Result<RgbaImage> {
        self.flatten_tracked(template, captured, placement, anchor, &mut ProgressTracker::no_op())
    }

    fn flatten_tracked(
        &self,
        template: &Raster,
        captured: &Raster,
        placement: PlacementRect,
        anchor: Anchor,
        tracker: &mut ProgressTracker,
    ) -> Result<RgbaImage> {
        Self::ensure_not_empty("template", template)?;
        Self::ensure_not_empty("captured photo", captured)?;
        placement.validate()?;

        let mut canvas = self.blank_canvas(template.width(), template.height());

        tracker.report_stage(CompositionStage::Projection);
        let crop = {
            let _span = span!(Level::DEBUG, "projection").entered();
            CoverFitProjector::project(
                f64::from(captured.width()),
                f64::from(captured.height()),
                f64::from(placement.width),
                f64::from(placement.height),
                anchor,
            )
            .to_pixel_rect(captured.width(), captured.height())
        };
        trace_debug!(
            crop_x = crop.x,
            crop_y = crop.y,
            crop_width = crop.width,
            crop_height = crop.height,
            "Cover-fit crop"
        );

        tracker.report_stage(CompositionStage::Drawing);
        {
            let _span = span!(Level::DEBUG, "drawing", placement = %placement).entered();
            let cropped =
                imageops::crop_imm(captured.as_image(), crop.x, crop.y, crop.width, crop.height)
                    .to_image();
            let photo = imageops::resize(
                &cropped,
                placement.width,
                placement.height,
                self.config.resample.into(),
            );
            imageops::overlay(&mut canvas, &photo, placement.x, placement.y);
            imageops::overlay(&mut canvas, template.as_image(), 0, 0);

            if self.config.calibration_outline {
                stroke_rect(&mut canvas, placement, OUTLINE_WIDTH, OUTLINE_COLOR);
            }
        }

        Ok(canvas)
    }

    fn finish(
        &self,
        token: ResultToken,
        canvas: RgbaImage,
        placement: PlacementRect,
        anchor: Anchor,
    ) -> Result<CompositeResult> {
        let dimensions = canvas.dimensions();
        let encoded = {
            let _span = span!(Level::DEBUG, "encoding", format = ?self.config.output_format).entered();
            OutputFormatHandler::encode(
                &Raster::from_image(canvas),
                self.config.output_format,
                self.config.jpeg_quality,
            )?
        };
        Ok(CompositeResult::new(
            token,
            encoded,
            self.config.output_format,
            dimensions,
            placement,
            anchor,
        ))
    }

    fn blank_canvas(&self, width: u32, height: u32) -> RgbaImage {
        let [r, g, b] = self.config.background;
        RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]))
    }

    fn ensure_not_empty(role: &str, raster: &Raster) -> Result<()> {
        if raster.is_empty() {
            return Err(PhotoBoothError::composition_stage_error(
                "input validation",
                &format!("{} has zero area", role),
                Some(&format!("{}x{}", raster.width(), raster.height())),
            ));
        }
        Ok(())
    }
}

/// Stroke the border of `rect` with a band of `width` pixels centred on its edge
fn stroke_rect(canvas: &mut RgbaImage, rect: PlacementRect, width: i64, color: Rgba<u8>) {
    let inner = width / 2;
    let outer = width - inner;
    let left = rect.x;
    let top = rect.y;
    let right = rect.x + i64::from(rect.width);
    let bottom = rect.y + i64::from(rect.height);

    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let x_range = (left - inner).max(0)..(right + inner).min(cw);
    let y_range = (top - inner).max(0)..(bottom + inner).min(ch);

    for y in y_range {
        let on_horizontal = y < top + outer || y >= bottom - outer;
        for x in x_range.clone() {
            let on_vertical = x < left + outer || x >= right - outer;
            if on_horizontal || on_vertical {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
