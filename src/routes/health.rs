use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::config::DeliveryMode;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// GET /health — fixed liveness marker.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub server_time: DateTime<Utc>,
    pub working_directory: String,
    pub available_files: Vec<String>,
    pub pipeline_bin: String,
    pub pipeline_bin_present: bool,
    pub delivery_mode: DeliveryMode,
}

/// GET /status — runtime environment diagnostics. Informational only, no
/// contract guarantees.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let working_directory = std::env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let available_files = std::fs::read_dir(".")
        .map(|entries| {
            entries
                .filter_map(|entry| {
                    entry
                        .ok()
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                })
                .collect()
        })
        .unwrap_or_default();

    Json(StatusResponse {
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        server_time: Utc::now(),
        working_directory,
        available_files,
        pipeline_bin: state.config.pipeline_bin.display().to_string(),
        pipeline_bin_present: state.config.pipeline_bin.exists(),
        delivery_mode: state.config.delivery_mode,
    })
}
