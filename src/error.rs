//! Error types for photo booth operations

use thiserror::Error;

/// Result type alias for photo booth operations
pub type Result<T> = std::result::Result<T, PhotoBoothError>;

/// Error types for loading, composing, keying and uploading rasters
#[derive(Error, Debug)]
pub enum PhotoBoothError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors raised while encoding results
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Source raster could not be decoded or fetched
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or zero-area raster at compose time
    #[error("Composition error: {0}")]
    Composition(String),

    /// Network or backend failure while uploading a result.
    ///
    /// The payload is the human-readable message shown to the user.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not permitted in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PhotoBoothError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new composition error
    pub fn composition<S: Into<String>>(msg: S) -> Self {
        Self::Composition(msg.into())
    }

    /// Create a new upload error
    pub fn upload<S: Into<String>>(msg: S) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Message suitable for showing to the user, without the kind prefix
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(msg)
            | Self::Composition(msg)
            | Self::Upload(msg)
            | Self::InvalidConfig(msg)
            | Self::InvalidState(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Io(e) => e.to_string(),
            Self::Image(e) => e.to_string(),
        }
    }

    // Enhanced contextual error creators

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create a network error that surfaces as a decode failure of a remote source
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Decode(format!("{}: {}", context.into(), error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create composition error with stage context
    pub fn composition_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Composition(format!(
            "Composition failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
