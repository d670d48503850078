//! Queue-handler entry point.
//!
//! Reads one job envelope from stdin, drives the job to its terminal
//! result, and writes the plain result object to stdout. Logs go to stderr
//! so stdout stays a clean result channel for the queueing system.

use std::time::Duration;

use pipeline_relay::{
    config::AppConfig,
    models::job::{JobEnvelope, JobResult},
    services::{controller::JobController, invoker::PipelineInvoker, transfer::TransferClient},
};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting pipeline-relay worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Wire up the job lifecycle services
    let transfer = TransferClient::new(
        &config.upload_url,
        Duration::from_secs(config.download_timeout_secs),
        Duration::from_secs(config.upload_timeout_secs),
    );
    let invoker = PipelineInvoker::new(
        &config.pipeline_bin,
        Duration::from_secs(config.pipeline_timeout_secs),
    );
    let controller = JobController::new(transfer, invoker, &config);

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .expect("Failed to read job envelope from stdin");

    // A malformed envelope is still a terminal result, not a crash.
    let result = match serde_json::from_str::<JobEnvelope>(&raw) {
        Ok(envelope) => {
            if let Some(id) = &envelope.id {
                tracing::info!(queue_job_id = %id, "processing queued job");
            }
            controller.execute(&envelope.input).await
        }
        Err(e) => JobResult::Error {
            error: format!("invalid job envelope: {e}"),
        },
    };

    let rendered = serde_json::to_string(&result).expect("Failed to serialize job result");
    println!("{rendered}");
}
