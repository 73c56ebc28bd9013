//! Photo booth CLI
//!
//! Compose captures into templates, key green-screen overlays and upload results.

use super::config::CliConfigBuilder;
use crate::{
    chroma_key::ChromaKeyFilter,
    cloudinary::CloudinaryUploader,
    compositor::CompositeEngine,
    config::OutputFormat,
    services::{
        ConsoleProgressReporter, ExportService, OutputFormatHandler, RasterLoader, RasterSource,
    },
    template::{Calibration, TemplateCatalog},
    types::{CompositeResult, NameLabel, OverlayPlacement},
    upload::{UploadCoordinator, UploadState, ViewScope},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Photo booth composition tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "photo-booth")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON (requires the tracing-json feature)
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// JSON configuration file; command-line options take precedence
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compose a photo into a template
    Compose(ComposeArgs),
    /// Remove the green background of an image
    Key(KeyArgs),
    /// Place an overlay (green-screen keyed by default) onto a frame
    Certificate(CertificateArgs),
    /// List built-in templates
    Templates,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ComposeArgs {
    /// Captured photo: file path, http(s) URL or data URL
    #[arg(long, value_name = "SRC")]
    pub photo: String,

    /// Built-in template to use
    #[arg(long, default_value_t = 1)]
    pub template_id: u32,

    /// Template image overriding the built-in template's source
    #[arg(long, value_name = "SRC")]
    pub template: Option<String>,

    /// Directory root-relative template paths are resolved against
    #[arg(long, value_name = "DIR")]
    pub asset_root: Option<PathBuf>,

    /// Output file [default: ./framed-photo.<ext>]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Placement X override
    #[arg(long, allow_hyphen_values = true)]
    pub x: Option<i64>,

    /// Placement Y override
    #[arg(long, allow_hyphen_values = true)]
    pub y: Option<i64>,

    /// Placement width override
    #[arg(long)]
    pub width: Option<u32>,

    /// Placement height override
    #[arg(long)]
    pub height: Option<u32>,

    /// Horizontal crop anchor (0 = keep left edge, 1 = keep right edge)
    #[arg(long, default_value_t = 0.5)]
    pub anchor_x: f64,

    /// Vertical crop anchor (0 = keep top edge, 1 = keep bottom edge)
    #[arg(long, default_value_t = 0.5)]
    pub anchor_y: f64,

    /// Draw the placement outline and print the placement as JSON
    #[arg(long)]
    pub outline: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Upload the result after writing it
    #[arg(long)]
    pub upload: bool,

    /// Retry a failed upload this many times
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Upload API base URL
    #[arg(long, env = "PHOTO_BOOTH_API_BASE")]
    pub api_base: Option<String>,

    /// Upload account name
    #[arg(long, env = "PHOTO_BOOTH_CLOUD_NAME")]
    pub cloud_name: Option<String>,

    /// Unsigned upload preset
    #[arg(long, env = "PHOTO_BOOTH_UPLOAD_PRESET")]
    pub upload_preset: Option<String>,

    /// Destination folder
    #[arg(long, env = "PHOTO_BOOTH_UPLOAD_FOLDER")]
    pub folder: Option<String>,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Image to key: file path, http(s) URL or data URL
    #[arg(long, value_name = "SRC")]
    pub input: String,

    /// Output PNG file
    #[arg(short, long, value_name = "FILE", default_value = "keyed.png")]
    pub output: PathBuf,

    /// Green must be strictly above this value
    #[arg(long)]
    pub min_green: Option<u8>,

    /// Green must exceed red and blue by this factor
    #[arg(long)]
    pub dominance: Option<f64>,
}

#[derive(Args, Debug)]
pub struct CertificateArgs {
    /// Frame image
    #[arg(long, value_name = "SRC")]
    pub frame: String,

    /// Overlay image, usually shot against a green screen
    #[arg(long, value_name = "SRC")]
    pub overlay: String,

    /// Output PNG file
    #[arg(short, long, value_name = "FILE", default_value = "certificate.png")]
    pub output: PathBuf,

    /// Use the overlay as-is instead of keying it
    #[arg(long)]
    pub no_key: bool,

    /// Guest name lettered on the certificate
    #[arg(long)]
    pub name: Option<String>,

    /// Green must be strictly above this value
    #[arg(long)]
    pub min_green: Option<u8>,

    /// Green must exceed red and blue by this factor
    #[arg(long)]
    pub dominance: Option<f64>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::tracing_config::init_cli_tracing(cli.verbose, cli.json_logs)
        .context("Failed to initialize tracing")?;

    match &cli.command {
        Command::Compose(args) => run_compose(&cli, args).await,
        Command::Key(args) => run_key(&cli, args).await,
        Command::Certificate(args) => run_certificate(&cli, args).await,
        Command::Templates => {
            list_templates();
            Ok(())
        },
    }
}

async fn run_compose(cli: &Cli, args: &ComposeArgs) -> Result<()> {
    let config = CliConfigBuilder::for_compose(cli.config.as_deref(), args)?;
    let catalog = TemplateCatalog::builtin();
    let template = catalog.require(args.template_id)?;
    let template_source = args
        .template
        .as_deref()
        .map_or_else(|| template.raster_source(), RasterSource::parse);
    let placement = CliConfigBuilder::placement(template.placement, args)?;
    let anchor = CliConfigBuilder::anchor(args);

    let mut loader = RasterLoader::new()?;
    if let Some(root) = &args.asset_root {
        loader = loader.with_asset_root(root);
    }

    let engine = CompositeEngine::new(config.composition.clone())?
        .with_reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)));

    info!("Composing {} into template '{}'", args.photo, template.name);
    let result = engine
        .compose_sources(
            &loader,
            &template_source,
            &RasterSource::parse(&args.photo),
            placement,
            anchor,
        )
        .await
        .context("Composition failed")?;

    if args.outline {
        let (w, h) = result.dimensions();
        println!("{}", Calibration::new(placement, w, h).snippet());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(ExportService::suggested_file_name(&result)));
    let written = ExportService::write_file(&result, &output).await?;
    println!("Saved {}", written.display());

    if args.upload {
        let uploader = CloudinaryUploader::new(config.upload.clone())?;
        upload_with_spinner(&result, Arc::new(uploader), args.retries, &written).await?;
    }
    Ok(())
}

async fn upload_with_spinner(
    result: &CompositeResult,
    uploader: Arc<CloudinaryUploader>,
    retries: u32,
    local: &Path,
) -> Result<()> {
    let coordinator = UploadCoordinator::new(uploader);
    let view = ViewScope::new();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Uploading...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut updates = coordinator.subscribe();
    let progress = spinner.clone();
    let watcher = tokio::spawn(async move {
        let mut attempts = 0u32;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match state {
                UploadState::Uploading => {
                    attempts += 1;
                    if attempts > 1 {
                        progress.set_message(format!("Uploading (retry {})...", attempts - 1));
                    }
                },
                UploadState::Failed(message) => {
                    progress.set_message(format!("Upload failed: {}", message));
                },
                UploadState::Idle | UploadState::Succeeded(_) => {},
            }
        }
    });

    let state = coordinator
        .upload_with_retries(result.clone(), &view.liveness(), retries)
        .await
        .context("Upload did not complete")?;
    watcher.abort();
    spinner.finish_and_clear();

    match state {
        UploadState::Succeeded(url) => {
            println!("Uploaded: {}", url);
        },
        UploadState::Failed(message) => {
            warn!("Upload failed after {} retries: {}", retries, message);
            println!("Upload failed: {}", message);
            println!("Local copy kept at {}", local.display());
        },
        other => debug!(state = %other, "Upload ended without a final state"),
    }
    Ok(())
}

async fn run_key(cli: &Cli, args: &KeyArgs) -> Result<()> {
    let base = CliConfigBuilder::load(cli.config.as_deref())?;
    let policy = CliConfigBuilder::chroma_policy(base.chroma_key, args.min_green, args.dominance)?;
    let loader = RasterLoader::new()?;

    let raster = loader
        .load(&RasterSource::parse(&args.input))
        .await
        .with_context(|| format!("Failed to load {}", args.input))?;
    let keyed = ChromaKeyFilter::new(policy).remove_background(&raster);
    let png = OutputFormatHandler::encode(&keyed, OutputFormat::Png, 100)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&args.output, png)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved {}", args.output.display());
    Ok(())
}

async fn run_certificate(cli: &Cli, args: &CertificateArgs) -> Result<()> {
    let base = CliConfigBuilder::load(cli.config.as_deref())?;
    let policy = CliConfigBuilder::chroma_policy(base.chroma_key, args.min_green, args.dominance)?;
    let loader = RasterLoader::new()?;

    let frame = loader
        .load(&RasterSource::parse(&args.frame))
        .await
        .with_context(|| format!("Failed to load frame {}", args.frame))?;

    let overlay_source = RasterSource::parse(&args.overlay);
    let overlay = match (&overlay_source, args.no_key) {
        (_, true) => loader.load(&overlay_source).await?,
        (RasterSource::Path(path), false) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read overlay {}", path.display()))?;
            let asset = ChromaKeyFilter::new(policy).extract_overlay(bytes, args.overlay.clone());
            if !asset.is_keyed() {
                warn!("Using overlay '{}' without background removal", asset.name);
            }
            asset.raster()?
        },
        (_, false) => {
            let raster = loader.load(&overlay_source).await?;
            ChromaKeyFilter::new(policy).remove_background(&raster)
        },
    };

    let engine = CompositeEngine::new(base.composition)?;
    let label = args.name.as_deref().map(NameLabel::new);
    let result =
        engine.compose_overlay(&frame, &overlay, OverlayPlacement::default(), label.as_ref())?;
    let written = ExportService::write_file(&result, &args.output).await?;
    println!("Saved {}", written.display());
    Ok(())
}

fn list_templates() {
    let catalog = TemplateCatalog::builtin();
    println!("Built-in templates:");
    for template in catalog.list() {
        println!(
            "  {:>3}  {:<20} {:<20} photo {}",
            template.id, template.name, template.source, template.placement
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compose() {
        let cli = Cli::parse_from([
            "photo-booth",
            "-vv",
            "compose",
            "--photo",
            "capture.jpg",
            "--anchor-x",
            "0.25",
            "--upload",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Compose(args) => {
                assert_eq!(args.photo, "capture.jpg");
                assert_eq!(args.template_id, 1);
                assert!((args.anchor_x - 0.25).abs() < f64::EPSILON);
                assert!(args.upload);
                assert_eq!(args.retries, 2);
            },
            _ => panic!("expected compose"),
        }
    }

    #[test]
    fn test_parse_key_defaults() {
        let cli = Cli::parse_from(["photo-booth", "key", "--input", "green.png"]);
        match cli.command {
            Command::Key(args) => {
                assert_eq!(args.output, PathBuf::from("keyed.png"));
                assert!(args.min_green.is_none());
            },
            _ => panic!("expected key"),
        }
    }

    #[test]
    fn test_parse_certificate_with_name() {
        let cli = Cli::parse_from([
            "photo-booth",
            "certificate",
            "--frame",
            "frame.png",
            "--overlay",
            "guest.png",
            "--name",
            "Ada Lovelace",
        ]);
        match cli.command {
            Command::Certificate(args) => {
                assert_eq!(args.name.as_deref(), Some("Ada Lovelace"));
                assert_eq!(args.output, PathBuf::from("certificate.png"));
            },
            _ => panic!("expected certificate"),
        }
    }

    #[test]
    fn test_parse_templates() {
        let cli = Cli::parse_from(["photo-booth", "templates"]);
        assert!(matches!(cli.command, Command::Templates));
    }
}
