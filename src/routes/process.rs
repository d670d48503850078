use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::{JobRequest, JobResult};
use crate::services::controller::JobError;
use crate::services::transfer::TransferError;

/// POST / — process one conversation file end-to-end.
///
/// The body is always a serialized [`JobResult`]; the status code reflects
/// the error taxonomy (caller-side failures are 400, everything else 500).
pub async fn process_job(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> (StatusCode, Json<JobResult>) {
    match state.controller.run(&request).await {
        Ok(completed) => (StatusCode::OK, Json(JobResult::Completed(completed))),
        Err(e) => (status_for(&e), Json(e.into_result())),
    }
}

fn status_for(error: &JobError) -> StatusCode {
    match error {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::Transfer(TransferError::Download(_)) => StatusCode::BAD_REQUEST,
        JobError::Transfer(_) | JobError::Pipeline(_) | JobError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
