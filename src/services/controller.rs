use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::TempDir;
use uuid::Uuid;

use crate::config::{AppConfig, DeliveryMode};
use crate::models::job::{CompletedJob, Delivery, JobRequest, JobResult, JobState};
use crate::services::invoker::{PipelineError, PipelineInvoker, PipelineSuccess, BUNDLE_FILENAME};
use crate::services::transfer::{self, TransferClient, TransferError};

/// Filename the staged download is written to inside the scratch directory.
const INPUT_FILENAME: &str = "conversation.json";

/// Error taxonomy for one job.
///
/// Collapses into the two failure shapes of [`JobResult`]; the variants
/// exist for logging and HTTP status mapping, not caller-visible branching.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Unexpected(String),
}

impl JobError {
    /// Stdout captured before the failure, for diagnostics.
    pub fn stdout(&self) -> Option<String> {
        match self {
            Self::Pipeline(e) => e.stdout().map(str::to_owned),
            _ => None,
        }
    }

    /// Collapse into the terminal result shape.
    pub fn into_result(self) -> JobResult {
        match self {
            Self::Unexpected(error) => JobResult::Error { error },
            other => {
                let stdout = other.stdout();
                JobResult::Failed {
                    error: other.to_string(),
                    stdout,
                }
            }
        }
    }
}

/// Owns the linear job lifecycle: validation, staging, invocation, delivery.
///
/// `Submitted → Validated → Invoked → Delivered → Completed`, with failure
/// exits from every state straight to a terminal result. No step is retried.
/// Each job stages under its own scratch directory, removed on every exit
/// path when the guard drops.
pub struct JobController {
    transfer: TransferClient,
    invoker: PipelineInvoker,
    delivery_mode: DeliveryMode,
    max_inline_bytes: u64,
    scratch_dir: PathBuf,
    bundle_dir: PathBuf,
}

impl JobController {
    pub fn new(transfer: TransferClient, invoker: PipelineInvoker, config: &AppConfig) -> Self {
        Self {
            transfer,
            invoker,
            delivery_mode: config.delivery_mode,
            max_inline_bytes: config.max_inline_bytes,
            scratch_dir: config.scratch_dir.clone(),
            bundle_dir: config.bundle_dir.clone(),
        }
    }

    /// Drive one job to its terminal result. Nothing escapes as an
    /// unhandled fault: every failure collapses into a result shape.
    pub async fn execute(&self, request: &JobRequest) -> JobResult {
        match self.run(request).await {
            Ok(completed) => JobResult::Completed(completed),
            Err(e) => e.into_result(),
        }
    }

    /// As [`execute`](Self::execute), but keeps the error taxonomy visible
    /// for transports that map it onto status codes.
    pub async fn run(&self, request: &JobRequest) -> Result<CompletedJob, JobError> {
        let started = Instant::now();
        metrics::counter!("pipeline_jobs_total").increment(1);

        let result = self.run_job(request).await;
        match &result {
            Ok(completed) => {
                metrics::counter!("pipeline_jobs_completed").increment(1);
                metrics::histogram!("pipeline_job_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    bundle_size = completed.bundle_size,
                    email = %completed.email,
                    "job completed"
                );
            }
            Err(e) => {
                metrics::counter!("pipeline_jobs_failed").increment(1);
                tracing::warn!(error = %e, "job failed");
            }
        }

        result
    }

    async fn run_job(&self, request: &JobRequest) -> Result<CompletedJob, JobError> {
        let job_id = Uuid::new_v4();
        tracing::info!(
            %job_id,
            email = %request.email,
            timestamp = %request.timestamp,
            "job submitted"
        );

        let source = match request.input_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => {
                return Err(JobError::Validation(
                    "source locator is required".to_string(),
                ))
            }
        };

        let scratch = TempDir::new_in(&self.scratch_dir)
            .map_err(|e| JobError::Unexpected(format!("failed to create scratch directory: {e}")))?;
        let input_path = scratch.path().join(INPUT_FILENAME);
        let output_dir = scratch.path().join("output");

        tracing::debug!(%job_id, url = source, "downloading input file");
        self.transfer.fetch(source, &input_path).await?;

        // The pipeline contract takes syntactically valid JSON only;
        // malformed content is discarded with the scratch directory.
        let staged = tokio::fs::read(&input_path)
            .await
            .map_err(|e| JobError::Unexpected(format!("failed to read staged input: {e}")))?;
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&staged) {
            return Err(JobError::Validation(format!("Invalid JSON file: {e}")));
        }
        trace_state(job_id, JobState::Validated);

        let success = self.invoker.run(&input_path, &output_dir).await?;
        trace_state(job_id, JobState::Invoked);

        let delivery = self.deliver(job_id, &success).await?;
        trace_state(job_id, JobState::Delivered);

        trace_state(job_id, JobState::Completed);
        Ok(CompletedJob {
            delivery,
            bundle_size: success.bundle_size,
            email: request.email.clone(),
            timestamp: request.timestamp.clone(),
            stdout: success.stdout,
        })
        // scratch drops here: staged input and raw bundle are removed
    }

    /// Hand the artifact back per the deployment's delivery mode.
    ///
    /// The bundle is never silently dropped: a required upload that yields
    /// no URL fails the job explicitly.
    async fn deliver(&self, job_id: Uuid, success: &PipelineSuccess) -> Result<Delivery, JobError> {
        let mut delivery = Delivery::default();
        let fits_inline = success.bundle_size <= self.max_inline_bytes;

        match self.delivery_mode {
            DeliveryMode::Inline => {
                if fits_inline {
                    delivery.bundle_base64 =
                        Some(transfer::encode_inline(&success.bundle_path).await?);
                } else {
                    tracing::warn!(
                        %job_id,
                        bundle_size = success.bundle_size,
                        "bundle exceeds inline cap, failing over to upload"
                    );
                    let uploaded = self
                        .transfer
                        .upload(&success.bundle_path)
                        .await
                        .ok_or(TransferError::UploadUnavailable)?;
                    delivery.zip_url = Some(uploaded.download_url);
                    delivery.zip_delete_url = uploaded.delete_url;
                }
            }
            DeliveryMode::LocalPath => {
                delivery.bundle_path =
                    Some(self.persist_bundle(job_id, &success.bundle_path).await?);
            }
            DeliveryMode::RemoteInline => {
                if fits_inline {
                    delivery.bundle_base64 =
                        Some(transfer::encode_inline(&success.bundle_path).await?);
                }
                match self.transfer.upload(&success.bundle_path).await {
                    Some(uploaded) => {
                        delivery.zip_url = Some(uploaded.download_url);
                        delivery.zip_delete_url = uploaded.delete_url;
                    }
                    None if delivery.bundle_base64.is_some() => {
                        tracing::warn!(%job_id, "upload unavailable, degrading to inline-only delivery");
                    }
                    None => return Err(TransferError::UploadUnavailable.into()),
                }
            }
        }

        Ok(delivery)
    }

    /// Move the bundle out of the scratch directory so the returned path
    /// outlives scratch teardown. Valid for the container's lifetime only.
    async fn persist_bundle(&self, job_id: Uuid, bundle_path: &Path) -> Result<PathBuf, JobError> {
        let dest = self.bundle_dir.join(format!("{job_id}-{BUNDLE_FILENAME}"));
        tokio::fs::copy(bundle_path, &dest)
            .await
            .map_err(|e| JobError::Unexpected(format!("failed to persist bundle: {e}")))?;
        Ok(dest)
    }
}

fn trace_state(job_id: Uuid, state: JobState) {
    tracing::debug!(%job_id, state = ?state, "job state advanced");
}
