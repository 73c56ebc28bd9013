//! Raster loading service
//!
//! Decodes templates and captured photos into [`Raster`]s, whatever they come
//! from: remote URLs, `data:` URLs, static asset paths or freshly captured blobs.
//! Captured blobs are given a temporary `blob:` handle for the duration of the
//! load; the handle is a guard and is revoked when dropped.

use crate::{
    error::{PhotoBoothError, Result},
    services::OutputFormatHandler,
    types::Raster,
};
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

const BLOB_SCHEME: &str = "blob:";

/// Binary image payload handed over by the capture collaborator
#[derive(Clone)]
pub struct CapturedBlob {
    bytes: Arc<[u8]>,
    content_type: String,
}

impl CapturedBlob {
    pub fn new<S: Into<String>>(bytes: Vec<u8>, content_type: S) -> Self {
        Self {
            bytes: Arc::from(bytes),
            content_type: content_type.into(),
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CapturedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedBlob")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Where a raster comes from
#[derive(Debug, Clone)]
pub enum RasterSource {
    /// `http(s)://`, `data:` or `blob:` URL
    Url(String),
    /// Local file or static asset path
    Path(PathBuf),
    /// Freshly captured binary payload
    Blob(CapturedBlob),
}

impl RasterSource {
    /// Interpret a user-supplied string: URL schemes become `Url`, anything else a path
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let is_url = ["http://", "https://", "data:", BLOB_SCHEME]
            .iter()
            .any(|scheme| value.starts_with(scheme));
        if is_url {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    /// Short description for logs, never the full payload
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) if url.starts_with("data:") => {
                format!("data URL ({} chars)", url.len())
            },
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
            Self::Blob(blob) => format!("{} blob ({} bytes)", blob.content_type(), blob.len()),
        }
    }
}

type BlobTable = Mutex<HashMap<String, CapturedBlob>>;

/// Registry of temporary `blob:` handles.
///
/// Every handle is owned by a [`BlobUrl`] guard; dropping the guard revokes it, so
/// the number of live handles returns to zero once loads finish.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    entries: Arc<BlobTable>,
}

impl BlobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return the guard owning its handle
    #[must_use]
    pub fn create_object_url(&self, blob: CapturedBlob) -> BlobUrl {
        let url = format!("{}{}", BLOB_SCHEME, uuid::Uuid::new_v4());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), blob);
        log::trace!("Created blob handle {}", url);
        BlobUrl {
            url,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Look up a live handle
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<CapturedBlob> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Number of handles not yet revoked
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Guard for a temporary `blob:` handle; revoked on drop
pub struct BlobUrl {
    url: String,
    entries: Weak<BlobTable>,
}

impl BlobUrl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobUrl").field(&self.url).finish()
    }
}

impl Drop for BlobUrl {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.url);
            log::trace!("Revoked blob handle {}", self.url);
        }
    }
}

/// Decodes raster sources into RGBA buffers
#[derive(Clone)]
pub struct RasterLoader {
    client: Client,
    blobs: BlobRegistry,
    asset_root: Option<PathBuf>,
}

impl RasterLoader {
    /// Create a loader with its own HTTP client
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PhotoBoothError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Create a loader around an existing HTTP client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            blobs: BlobRegistry::new(),
            asset_root: None,
        }
    }

    /// Resolve root-relative asset paths (`/templates/a.png`) against a directory
    #[must_use]
    pub fn with_asset_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Registry backing the temporary blob handles
    #[must_use]
    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Load and decode a raster.
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a supported image, the image has zero area,
    ///   the file cannot be read, or a remote fetch fails
    pub async fn load(&self, source: &RasterSource) -> Result<Raster> {
        log::debug!("Loading raster from {}", source.describe());
        match source {
            RasterSource::Url(url) => self.load_url(url).await,
            RasterSource::Path(path) => self.load_path(path).await,
            RasterSource::Blob(blob) => {
                // The handle lives only for this load and is revoked on every path.
                let handle = self.blobs.create_object_url(blob.clone());
                self.load_url(handle.as_str()).await
            },
        }
    }

    async fn load_url(&self, url: &str) -> Result<Raster> {
        if url.starts_with(BLOB_SCHEME) {
            let blob = self.blobs.resolve(url).ok_or_else(|| {
                PhotoBoothError::decode(format!("Blob handle {} is not live", url))
            })?;
            return Self::decode_bytes(blob.bytes());
        }

        if url.starts_with("data:") {
            let (_mime, bytes) = OutputFormatHandler::parse_data_url(url)
                .ok_or_else(|| PhotoBoothError::decode("Malformed base64 data URL"))?;
            return Self::decode_bytes(&bytes);
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            let bytes = self.fetch(url).await?;
            return Self::decode_bytes(&bytes);
        }

        self.load_path(Path::new(url)).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PhotoBoothError::network_error(format!("Failed to fetch {}", url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhotoBoothError::decode(format!(
                "HTTP error {} for {}",
                status, url
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            PhotoBoothError::network_error(format!("Failed to read body of {}", url), e)
        })?;
        Ok(bytes.to_vec())
    }

    async fn load_path(&self, path: &Path) -> Result<Raster> {
        let resolved = self.resolve_path(path);
        let data = tokio::fs::read(&resolved).await.map_err(|e| {
            PhotoBoothError::decode(format!(
                "Failed to read image file '{}': {}",
                resolved.display(),
                e
            ))
        })?;
        Self::decode_bytes(&data)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.asset_root {
            Some(root) => root.join(path.strip_prefix("/").unwrap_or(path)),
            None => path.to_path_buf(),
        }
    }

    /// Decode encoded image bytes, sniffing the format from content.
    ///
    /// # Errors
    /// - `Decode` for unsupported or corrupt data and zero-area images
    pub fn decode_bytes(bytes: &[u8]) -> Result<Raster> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            PhotoBoothError::decode(format!(
                "Failed to decode image ({} bytes): {}",
                bytes.len(),
                e
            ))
        })?;
        let raster = Raster::from_dynamic(&image);
        if raster.is_empty() {
            return Err(PhotoBoothError::decode(format!(
                "Image has zero area ({}x{})",
                raster.width(),
                raster.height()
            )));
        }
        Ok(raster)
    }
}
