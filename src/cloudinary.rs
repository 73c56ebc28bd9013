//! Unsigned image upload to a Cloudinary-compatible endpoint.
//!
//! The composite is sent as a `data:` URL in the `file` field of a multipart
//! form together with the upload preset and destination folder.

use crate::{
    config::UploadConfig,
    error::{PhotoBoothError, Result},
    types::CompositeResult,
    upload::{UploadedImage, Uploader},
};
use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Message for a failed upload response.
///
/// Uses the backend's `error.message` when the body carries one, otherwise a
/// status-based fallback.
#[must_use]
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Upload failed with status {}", status.as_u16()))
}

/// [`Uploader`] posting to `{api_base}/{cloud_name}/image/upload`
pub struct CloudinaryUploader {
    client: Client,
    config: UploadConfig,
}

impl CloudinaryUploader {
    /// Create an uploader with its own HTTP client
    ///
    /// # Errors
    /// - Invalid upload configuration
    /// - Failed to create HTTP client
    pub fn new(config: UploadConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PhotoBoothError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    fn form(&self, result: &CompositeResult) -> multipart::Form {
        multipart::Form::new()
            .text("file", result.to_data_url())
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", self.config.folder.clone())
    }
}

#[async_trait]
impl Uploader for CloudinaryUploader {
    async fn upload(&self, result: &CompositeResult) -> Result<UploadedImage> {
        let endpoint = self.config.endpoint();
        log::debug!(
            "Uploading result {} ({} bytes) to {}",
            result.token(),
            result.bytes().len(),
            endpoint
        );

        let response = self
            .client
            .post(&endpoint)
            .multipart(self.form(result))
            .send()
            .await
            .map_err(|e| PhotoBoothError::upload(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PhotoBoothError::upload(format!("Failed to read upload response: {}", e)))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            log::warn!("Upload rejected with status {}: {}", status, message);
            return Err(PhotoBoothError::upload(message));
        }

        serde_json::from_str::<UploadedImage>(&body).map_err(|e| {
            PhotoBoothError::upload(format!("Unexpected upload response: {}", e))
        })
    }
}
