use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pipeline_relay::app_state::AppState;
use pipeline_relay::config::AppConfig;
use pipeline_relay::routes;
use pipeline_relay::services::{
    controller::JobController, invoker::PipelineInvoker, transfer::TransferClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing pipeline-relay server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // Register application metrics
    metrics::describe_counter!("pipeline_jobs_total", "Total pipeline jobs submitted");
    metrics::describe_counter!("pipeline_jobs_completed", "Total pipeline jobs completed");
    metrics::describe_counter!("pipeline_jobs_failed", "Total pipeline jobs that failed");
    metrics::describe_histogram!(
        "pipeline_job_seconds",
        "Time to run one pipeline job end-to-end"
    );

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

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, controller);

    // Build API routes
    let app = Router::new()
        .route("/", post(routes::process::process_job))
        .route("/health", get(routes::health::health_check))
        .route("/status", get(routes::health::status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(move || async move { prometheus_handle.render() }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting pipeline-relay on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
