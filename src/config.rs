//! Configuration types for composition, chroma keying and uploads

use crate::error::{PhotoBoothError, Result};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG (default)
    #[default]
    Png,
    /// JPEG (no transparency)
    Jpeg,
}

/// Resampling filter used when scaling the captured photo into its placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    /// Bilinear, closest to what a browser canvas does
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for the composite engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Base fill drawn before any layer; alpha is forced opaque
    pub background: [u8; 3],

    /// Encoding of the flattened result
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Filter used to scale the cropped capture into the placement rectangle
    pub resample: ResampleFilter,

    /// Stroke the placement rectangle on top of the result (calibration aid)
    pub calibration_outline: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
            resample: ResampleFilter::Triangle,
            calibration_outline: false,
        }
    }
}

impl CompositionConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use photo_booth::{CompositionConfig, OutputFormat};
    ///
    /// let config = CompositionConfig::builder()
    ///     .output_format(OutputFormat::Png)
    ///     .calibration_outline(true)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.calibration_outline);
    /// ```
    #[must_use]
    pub fn builder() -> CompositionConfigBuilder {
        CompositionConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality outside 0-100
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(PhotoBoothError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }
        Ok(())
    }
}

/// Builder for `CompositionConfig`
#[derive(Debug, Default)]
pub struct CompositionConfigBuilder {
    config: CompositionConfig,
}

impl CompositionConfigBuilder {
    /// Set the opaque base color
    #[must_use]
    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.config.background = rgb;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality (clamped to 0-100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Set resampling filter
    #[must_use]
    pub fn resample(mut self, filter: ResampleFilter) -> Self {
        self.config.resample = filter;
        self
    }

    /// Enable or disable the calibration outline
    #[must_use]
    pub fn calibration_outline(mut self, enabled: bool) -> Self {
        self.config.calibration_outline = enabled;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Validation failure (see [`CompositionConfig::validate`])
    pub fn build(self) -> Result<CompositionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Threshold policy for the green-screen classifier.
///
/// A pixel is background when `g > min_green`, `g > r * dominance` and
/// `g > b * dominance`. The defaults (100, 1.2) are hand-tuned for typical green
/// screens and carry no derivation beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeyPolicy {
    /// Green must be strictly above this value
    pub min_green: u8,
    /// Green must exceed red and blue by this factor
    pub dominance: f64,
}

impl Default for ChromaKeyPolicy {
    fn default() -> Self {
        Self {
            min_green: 100,
            dominance: 1.2,
        }
    }
}

impl ChromaKeyPolicy {
    /// Classify one pixel
    #[inline]
    #[must_use]
    pub fn is_background(&self, r: u8, g: u8, b: u8) -> bool {
        let green = f64::from(g);
        g > self.min_green
            && green > f64::from(r) * self.dominance
            && green > f64::from(b) * self.dominance
    }

    /// Validate the policy
    ///
    /// # Errors
    /// - Dominance factor that is not a finite positive number
    pub fn validate(&self) -> Result<()> {
        if !self.dominance.is_finite() || self.dominance <= 0.0 {
            return Err(PhotoBoothError::config_value_error(
                "chroma dominance",
                self.dominance,
                "> 0",
                Some(1.2),
            ));
        }
        Ok(())
    }
}

/// Upload backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Base of the upload API, without the cloud name
    pub api_base: String,
    /// Account identifier appended to the API base
    pub cloud_name: String,
    /// Unsigned upload profile identifier
    pub upload_preset: String,
    /// Destination folder tag
    pub folder: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            cloud_name: "dzz5belph".to_string(),
            upload_preset: "ImageUpload".to_string(),
            folder: "photo-booth".to_string(),
            timeout_secs: 60,
        }
    }
}

impl UploadConfig {
    /// Full image upload endpoint
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.api_base.trim_end_matches('/'),
            self.cloud_name
        )
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Empty cloud name or upload preset
    /// - Zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.cloud_name.trim().is_empty() {
            return Err(PhotoBoothError::invalid_config("cloud name must not be empty"));
        }
        if self.upload_preset.trim().is_empty() {
            return Err(PhotoBoothError::invalid_config(
                "upload preset must not be empty",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(PhotoBoothError::config_value_error(
                "upload timeout",
                self.timeout_secs,
                "1-3600 seconds",
                Some(60),
            ));
        }
        Ok(())
    }
}

/// Aggregate configuration, loadable from JSON by frontends
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    pub composition: CompositionConfig,
    pub chroma_key: ChromaKeyPolicy,
    pub upload: UploadConfig,
}

impl BoothConfig {
    /// Load and validate a JSON configuration file; missing fields take defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON
    /// - Validation failure of any section
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PhotoBoothError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            PhotoBoothError::invalid_config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    /// - First section that fails validation
    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        self.chroma_key.validate()?;
        self.upload.validate()
    }
}
