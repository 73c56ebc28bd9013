//! Export collaborators: writing the composite to disk and producing the
//! payloads used by download links and QR codes.

use crate::{
    error::{PhotoBoothError, Result},
    services::OutputFormatHandler,
    types::CompositeResult,
    upload::UploadState,
};
use std::path::{Path, PathBuf};

/// Default stem of downloaded files
pub const DEFAULT_FILE_STEM: &str = "framed-photo";

/// Service for local export of composite results.
///
/// None of these depend on the upload having succeeded.
pub struct ExportService;

impl ExportService {
    /// File name used for downloads, e.g. `framed-photo.png`
    #[must_use]
    pub fn suggested_file_name(result: &CompositeResult) -> String {
        format!(
            "{}.{}",
            DEFAULT_FILE_STEM,
            OutputFormatHandler::get_extension(result.format())
        )
    }

    /// Write the encoded bytes to `path`, creating parent directories
    pub async fn write_file<P: AsRef<Path>>(result: &CompositeResult, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PhotoBoothError::file_io_error("create output directory", parent, &e)
            })?;
        }
        tokio::fs::write(path, result.bytes())
            .await
            .map_err(|e| PhotoBoothError::file_io_error("write composite", path, &e))?;
        log::info!(
            "Wrote {} ({} bytes, result {})",
            path.display(),
            result.bytes().len(),
            result.token()
        );
        Ok(path.to_path_buf())
    }

    /// Write into `dir` under the suggested file name
    pub async fn write_to_dir<P: AsRef<Path>>(result: &CompositeResult, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(Self::suggested_file_name(result));
        Self::write_file(result, path).await
    }

    /// `data:` URL of the result, used as a download link target
    #[must_use]
    pub fn data_url(result: &CompositeResult) -> String {
        result.to_data_url()
    }

    /// Payload for a QR code: the remote URL once uploaded, else the data URL
    #[must_use]
    pub fn qr_payload(result: &CompositeResult, upload: &UploadState) -> String {
        match upload {
            UploadState::Succeeded(url) => url.clone(),
            _ => Self::data_url(result),
        }
    }
}
