//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{CliOutputFormat, ComposeArgs};
use crate::{
    config::{BoothConfig, ChromaKeyPolicy, OutputFormat},
    types::{Anchor, PlacementRect},
};
use anyhow::{Context, Result};
use std::path::Path;

/// Merge the optional JSON config file with command-line overrides
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Base configuration: the JSON file when given, defaults otherwise
    pub(crate) fn load(config_path: Option<&Path>) -> Result<BoothConfig> {
        match config_path {
            Some(path) => BoothConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display())),
            None => Ok(BoothConfig::default()),
        }
    }

    /// Apply `compose` arguments on top of the base configuration
    pub(crate) fn for_compose(config_path: Option<&Path>, args: &ComposeArgs) -> Result<BoothConfig> {
        let mut config = Self::load(config_path)?;

        if let Some(format) = args.format {
            config.composition.output_format = match format {
                CliOutputFormat::Png => OutputFormat::Png,
                CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            };
        }
        if let Some(quality) = args.jpeg_quality {
            config.composition.jpeg_quality = quality.min(100);
        }
        if args.outline {
            config.composition.calibration_outline = true;
        }

        let upload = &mut config.upload;
        if let Some(api_base) = &args.api_base {
            upload.api_base.clone_from(api_base);
        }
        if let Some(cloud_name) = &args.cloud_name {
            upload.cloud_name.clone_from(cloud_name);
        }
        if let Some(preset) = &args.upload_preset {
            upload.upload_preset.clone_from(preset);
        }
        if let Some(folder) = &args.folder {
            upload.folder.clone_from(folder);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Chroma key policy with optional threshold overrides
    pub(crate) fn chroma_policy(
        base: ChromaKeyPolicy,
        min_green: Option<u8>,
        dominance: Option<f64>,
    ) -> Result<ChromaKeyPolicy> {
        let policy = ChromaKeyPolicy {
            min_green: min_green.unwrap_or(base.min_green),
            dominance: dominance.unwrap_or(base.dominance),
        };
        policy.validate().context("Invalid chroma key thresholds")?;
        Ok(policy)
    }

    /// Template placement with per-field overrides
    pub(crate) fn placement(base: PlacementRect, args: &ComposeArgs) -> Result<PlacementRect> {
        let placement = PlacementRect::new(
            args.x.unwrap_or(base.x),
            args.y.unwrap_or(base.y),
            args.width.unwrap_or(base.width),
            args.height.unwrap_or(base.height),
        );
        placement.validate().context("Invalid placement")?;
        Ok(placement)
    }

    pub(crate) fn anchor(args: &ComposeArgs) -> Anchor {
        Anchor::new(args.anchor_x, args.anchor_y).clamped()
    }
}
