use base64::Engine;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Moves artifact bytes between the network and local storage: downloads the
/// input file and pushes the produced bundle to the hosting endpoint.
pub struct TransferClient {
    http: reqwest::Client,
    upload_url: String,
    download_timeout: Duration,
    upload_timeout: Duration,
}

/// A bundle hosted on the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedBundle {
    pub download_url: String,
    pub delete_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    data: UploadData,
}

#[derive(Debug, Default, Deserialize)]
struct UploadData {
    #[serde(default)]
    dl_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    delete_url: Option<String>,
}

impl TransferClient {
    pub fn new(
        upload_url: impl Into<String>,
        download_timeout: Duration,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.into(),
            download_timeout,
            upload_timeout,
        }
    }

    /// Download `url` into `dest`.
    ///
    /// The body is fully read into memory before the destination file is
    /// written, so a failed fetch never leaves a file that looks complete.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(TransferError::Download)?
            .error_for_status()
            .map_err(TransferError::Download)?;

        let body = response.bytes().await.map_err(TransferError::Download)?;
        tokio::fs::write(dest, &body).await?;

        tracing::debug!(url, bytes = body.len(), "input file staged");
        Ok(body.len() as u64)
    }

    /// Upload the bundle to the hosting endpoint.
    ///
    /// Returns `None` on any failure (network error, non-2xx, missing URL in
    /// the response) so the caller can degrade to another delivery mode
    /// instead of aborting the job.
    pub async fn upload(&self, path: &Path) -> Option<UploadedBundle> {
        match self.try_upload(path).await {
            Ok(Some(uploaded)) => {
                tracing::info!(url = %uploaded.download_url, "bundle uploaded");
                Some(uploaded)
            }
            Ok(None) => {
                tracing::warn!("upload response missing download URL");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "bundle upload failed");
                None
            }
        }
    }

    async fn try_upload(&self, path: &Path) -> Result<Option<UploadedBundle>, TransferError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle.zip".to_string());
        let bytes = tokio::fs::read(path).await?;

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(TransferError::UploadRequest)?
            .error_for_status()
            .map_err(TransferError::UploadRequest)?;

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(TransferError::UploadRequest)?;

        Ok(extract_uploaded(parsed))
    }
}

/// Base64-encode the bundle for inline transport in the result payload.
pub async fn encode_inline(path: &Path) -> Result<String, TransferError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn extract_uploaded(response: UploadResponse) -> Option<UploadedBundle> {
    let url = response.data.dl_url.or(response.data.url)?;

    Some(UploadedBundle {
        download_url: direct_download_url(url),
        delete_url: response.data.delete_url,
    })
}

/// tmpfiles.org serves an HTML landing page at the plain URL; the direct
/// download lives under /dl/.
fn direct_download_url(url: String) -> String {
    if url.contains("tmpfiles.org/") && !url.contains("/dl/") {
        url.replace("tmpfiles.org/", "tmpfiles.org/dl/")
    } else {
        url
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Failed to download input file: {0}")]
    Download(#[source] reqwest::Error),

    #[error("failed to stage file locally: {0}")]
    Stage(#[from] std::io::Error),

    #[error("upload request failed: {0}")]
    UploadRequest(#[source] reqwest::Error),

    #[error("Failed to upload bundle")]
    UploadUnavailable,
}
