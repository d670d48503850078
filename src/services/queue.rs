use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::models::job::JobRequest;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

/// Client for a remote serverless job-queue endpoint.
///
/// Used by callers that dispatch work to a remote instance of this system
/// rather than running it in-process. All calls are bearer-token
/// authenticated.
pub struct QueueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    endpoint_id: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

/// Acknowledgement returned when a job is accepted by the queue.
#[derive(Debug, Deserialize)]
pub struct SubmittedJob {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// One status poll's view of a queued job.
#[derive(Debug, Deserialize)]
pub struct QueueJobStatus {
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueueClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        endpoint_id: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            endpoint_id: endpoint_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the initial polling interval (it doubles per poll up to a
    /// fixed ceiling).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the bound on status polls before giving up.
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    /// Submit a job; the request travels under the queue's `input` wrapper.
    pub async fn submit(&self, input: &JobRequest) -> Result<SubmittedJob, QueueError> {
        let url = format!("{}/v2/{}/run", self.base_url, self.endpoint_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Fetch the current status of a queued job.
    pub async fn status(&self, job_id: &str) -> Result<QueueJobStatus, QueueError> {
        let url = format!(
            "{}/v2/{}/status/{}",
            self.base_url, self.endpoint_id, job_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Cancel a queued or running job.
    pub async fn cancel(&self, job_id: &str) -> Result<(), QueueError> {
        let url = format!(
            "{}/v2/{}/cancel/{}",
            self.base_url, self.endpoint_id, job_id
        );
        self.http
            .post(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// A fixed-interval loop hangs forever on a stuck job, so polling backs
    /// off exponentially and stops after a hard attempt cap.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<Value, QueueError> {
        let mut interval = self.poll_interval;

        for attempt in 1..=self.max_poll_attempts {
            let job = self.status(job_id).await?;

            match job.status.as_str() {
                "COMPLETED" => return Ok(job.output.unwrap_or(Value::Null)),
                "FAILED" => {
                    return Err(QueueError::JobFailed(
                        job.error.unwrap_or_else(|| "Unknown error".to_string()),
                    ))
                }
                "CANCELLED" | "TIMED_OUT" => {
                    return Err(QueueError::JobFailed(format!("job ended as {}", job.status)))
                }
                other => {
                    tracing::debug!(job_id, status = other, attempt, "job still in progress");
                }
            }

            sleep(interval).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }

        Err(QueueError::DeadlineExceeded(self.max_poll_attempts))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("job did not complete within {0} status polls")]
    DeadlineExceeded(u32),
}
