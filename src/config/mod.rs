use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the produced bundle is handed back to the caller.
///
/// The mode is fixed per deployment, never caller-selectable. `remote-inline`
/// degrades gracefully to inline-only when the upload endpoint yields no URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Base64 bytes embedded directly in the result payload.
    Inline,
    /// Filesystem path, valid only for the lifetime of this container.
    LocalPath,
    /// Hosted download URL plus inline base64 when the bundle is small enough.
    RemoteInline,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to the pipeline executable invoked once per job
    pub pipeline_bin: PathBuf,

    /// Wall-clock bound on one pipeline invocation, in seconds
    #[serde(default = "default_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,

    /// Per-call timeout for downloading the input file, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Per-call timeout for uploading the bundle, in seconds
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Hosting endpoint the bundle is uploaded to
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Delivery strategy for this deployment
    #[serde(default = "default_delivery_mode")]
    pub delivery_mode: DeliveryMode,

    /// Largest bundle embedded inline before failing over to upload
    #[serde(default = "default_max_inline_bytes")]
    pub max_inline_bytes: u64,

    /// Root under which per-job scratch directories are created
    #[serde(default = "default_temp_dir")]
    pub scratch_dir: PathBuf,

    /// Directory bundles are persisted to under local-path delivery
    #[serde(default = "default_temp_dir")]
    pub bundle_dir: PathBuf,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_pipeline_timeout_secs() -> u64 {
    300
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_upload_timeout_secs() -> u64 {
    60
}

fn default_upload_url() -> String {
    "https://tmpfiles.org/api/v1/upload".to_string()
}

fn default_delivery_mode() -> DeliveryMode {
    DeliveryMode::RemoteInline
}

fn default_max_inline_bytes() -> u64 {
    8 * 1024 * 1024
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
