use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A request to process one conversation file end-to-end.
///
/// `email` and `timestamp` are caller-supplied tags echoed back in the
/// result; they are never validated and never drive control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// URL of the conversation file to process. `fileUrl` is accepted as a
    /// legacy alias from older queue payloads.
    #[serde(
        rename = "inputUrl",
        alias = "fileUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_url: Option<String>,

    #[serde(default = "default_email")]
    pub email: String,

    #[serde(default = "default_timestamp")]
    pub timestamp: String,
}

fn default_email() -> String {
    "unknown@example.com".to_string()
}

fn default_timestamp() -> String {
    "unknown".to_string()
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            input_url: None,
            email: default_email(),
            timestamp: default_timestamp(),
        }
    }
}

/// Queue transport wrapper: the job fields arrive under an `input` key.
///
/// A missing `input` behaves as an empty request, which then fails
/// validation on the missing source locator.
#[derive(Debug, Deserialize)]
pub struct JobEnvelope {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub input: JobRequest,
}

/// Progression of one job through the lifecycle. Linear; failures exit
/// directly to a terminal result from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Validated,
    Invoked,
    Delivered,
    Completed,
}

/// Where and how the produced bundle can be retrieved. Fields are populated
/// according to the deployment's delivery mode; absent ones are omitted from
/// the wire shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delivery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_base64: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<PathBuf>,

    #[serde(rename = "zipUrl", skip_serializing_if = "Option::is_none")]
    pub zip_url: Option<String>,

    #[serde(rename = "zipDeleteUrl", skip_serializing_if = "Option::is_none")]
    pub zip_delete_url: Option<String>,
}

/// A successfully delivered job: the bundle descriptor, its byte size, the
/// echoed caller tags, and the pipeline's captured stdout.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedJob {
    #[serde(flatten)]
    pub delivery: Delivery,

    pub bundle_size: u64,
    pub email: String,
    pub timestamp: String,
    pub stdout: String,
}

/// Terminal result of one job. Exactly one shape is produced per job; no
/// partial result ever escapes the controller.
///
/// `Error` differs from `Failed` only in marking failures outside the
/// expected validation/processing paths; the distinction is cosmetic.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Completed(CompletedJob),

    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stdout: Option<String>,
    },

    Error {
        error: String,
    },
}
