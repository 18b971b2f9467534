//! Job status and result lookup.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/status/{id}` | Current status, progress and message |
//! | GET | `/api/result/{id}` | Download URL of a finished job |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{JobStatusResponse, ResultResponse};
use crate::api::server::AppState;
use crate::pipeline::{JobId, JobRecord, JobStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status/{id}", get(get_status))
        .route("/result/{id}", get(get_result))
}

fn lookup(state: &AppState, id: &str) -> ApiResult<JobRecord> {
    state
        .store
        .get(&JobId::from(id))
        .ok_or_else(|| ApiError::not_found(format!("Job with id '{}' not found", id)))
}

async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let record = lookup(&state, &id)?;
    Ok(Json(record.into()))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResultResponse>> {
    let record = lookup(&state, &id)?;

    if record.status != JobStatus::Done {
        return Err(ApiError::conflict("Job not finished")
            .with_details(serde_json::json!({ "status": record.status })));
    }

    let path = record
        .result
        .ok_or_else(|| ApiError::internal("Result file missing"))?;
    let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
    let file_name = path.file_name().and_then(|n| n.to_str());

    match file_name {
        Some(name) if exists => Ok(Json(ResultResponse {
            download_url: format!("/download/{}", name),
        })),
        _ => {
            tracing::error!(job_id = %id, path = %path.display(), "Result file missing");
            Err(ApiError::internal("Result file missing"))
        }
    }
}
