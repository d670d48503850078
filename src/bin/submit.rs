//! Consumer-side submission client.
//!
//! Submits one job to a remote queue endpoint and polls until it reaches a
//! terminal state, printing the job output on success.

use pipeline_relay::models::job::JobRequest;
use pipeline_relay::services::queue::QueueClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();

    let api_url =
        std::env::var("QUEUE_API_URL").unwrap_or_else(|_| "https://api.runpod.io".to_string());
    let api_key = std::env::var("QUEUE_API_KEY").expect("QUEUE_API_KEY must be set");
    let endpoint_id = std::env::var("QUEUE_ENDPOINT_ID").expect("QUEUE_ENDPOINT_ID must be set");

    let input_url = std::env::args().nth(1).expect("usage: submit <input-url>");

    let client = QueueClient::new(api_url, api_key, endpoint_id);

    let request = JobRequest {
        input_url: Some(input_url),
        ..JobRequest::default()
    };

    let job = client.submit(&request).await.expect("Failed to submit job");
    tracing::info!(job_id = %job.id, status = ?job.status, "job submitted");

    match client.wait_for_completion(&job.id).await {
        Ok(output) => {
            let rendered =
                serde_json::to_string_pretty(&output).expect("Failed to serialize job output");
            println!("{rendered}");
        }
        Err(e) => {
            tracing::error!(error = %e, "job did not complete");
            std::process::exit(1);
        }
    }
}
