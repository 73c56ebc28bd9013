#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Photo Booth
//!
//! Composition core of a photo booth: put a captured photo behind a template frame,
//! key green-screen overlays, and upload the result without ever blocking local
//! export.
//!
//! ## Features
//!
//! - **Cover-fit compositing**: the photo fills its slot in the template without
//!   distortion, cropped around a configurable anchor
//! - **Chroma keying**: per-pixel green-screen removal with tunable thresholds
//! - **Certificates**: keyed overlays placed on a frame, with the guest's name
//!   lettered in a bundled font
//! - **Resilient uploads**: one attempt per result, explicit retry after failure,
//!   and state commits that respect the lifetime of the view showing them
//! - **Sources**: files, `http(s)` URLs, `data:` URLs and captured blobs
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photo_booth::{
//!     Anchor, CompositeEngine, CompositionConfig, ExportService, RasterLoader, RasterSource,
//!     TemplateCatalog,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let catalog = TemplateCatalog::builtin();
//! let template = catalog.require(1)?;
//!
//! let loader = RasterLoader::new()?.with_asset_root("public");
//! let engine = CompositeEngine::new(CompositionConfig::default())?;
//! let result = engine
//!     .compose_sources(
//!         &loader,
//!         &template.raster_source(),
//!         &RasterSource::parse("capture.jpg"),
//!         template.placement,
//!         Anchor::CENTER,
//!     )
//!     .await?;
//!
//! ExportService::write_to_dir(&result, "out").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Uploading
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use photo_booth::{CloudinaryUploader, UploadConfig, UploadCoordinator, ViewScope};
//!
//! # async fn example(result: photo_booth::CompositeResult) -> anyhow::Result<()> {
//! let uploader = CloudinaryUploader::new(UploadConfig::default())?;
//! let coordinator = UploadCoordinator::new(Arc::new(uploader));
//! let view = ViewScope::new();
//!
//! if let Some(attempt) = coordinator.on_result_ready(result, &view.liveness()).into_handle() {
//!     attempt.await?;
//! }
//! println!("{}", coordinator.state());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support`: WebP input decoding

pub mod chroma_key;
#[cfg(feature = "cli")]
pub mod cli;
pub mod cloudinary;
pub mod compositor;
pub mod config;
pub mod error;
pub mod lettering;
pub mod projector;
pub mod services;
pub mod template;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod upload;

// Public API exports
pub use chroma_key::{ChromaKeyFilter, OverlayAsset, OverlaySource};
pub use cloudinary::CloudinaryUploader;
pub use compositor::CompositeEngine;
pub use config::{
    BoothConfig, ChromaKeyPolicy, CompositionConfig, CompositionConfigBuilder, OutputFormat,
    ResampleFilter, UploadConfig,
};
pub use error::{PhotoBoothError, Result};
pub use projector::{ContainRect, CoverFitProjector, PixelRect, SourceCropRect};
pub use services::{
    BlobRegistry, BlobUrl, CapturedBlob, CompositionStage, ConsoleProgressReporter,
    ExportService, NoOpProgressReporter, OutputFormatHandler, ProgressReporter, ProgressTracker,
    ProgressUpdate, RasterLoader, RasterSource,
};
pub use template::{Calibration, Template, TemplateCatalog};
pub use types::{
    Anchor, CompositeRequest, CompositeResult, NameLabel, OverlayPlacement, PlacementRect,
    Raster, ResultToken,
};
pub use upload::{
    Liveness, ReadyOutcome, UploadCoordinator, UploadState, UploadedImage, Uploader, ViewScope,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Key a green-screen upload with the default policy
///
/// # Errors
/// - `Decode` when the bytes are not a supported image
pub fn remove_green_background(image_bytes: &[u8]) -> Result<Raster> {
    ChromaKeyFilter::default().remove_background_from_bytes(image_bytes)
}

/// Compose a captured blob into a template with default settings
///
/// # Errors
/// - `Composition` when either source cannot be loaded or has zero area
pub async fn compose_capture(
    template: &Template,
    capture: CapturedBlob,
    loader: &RasterLoader,
) -> Result<CompositeResult> {
    let engine = CompositeEngine::new(CompositionConfig::default())?;
    engine
        .compose_sources(
            loader,
            &template.raster_source(),
            &RasterSource::Blob(capture),
            template.placement,
            Anchor::CENTER,
        )
        .await
}
