//! Conversion submission.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/convert` | Upload a video (multipart `file`, optional `style`, `resolution`) |

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    routing::post,
};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::ConvertResponse;
use crate::api::server::AppState;
use crate::pipeline::Submission;

pub fn router() -> Router<AppState> {
    Router::new().route("/convert", post(convert))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), "BAD_REQUEST", e.body_text())
}

/// Accept an upload and start its conversion.
///
/// Responds `202` with the job id as soon as the job is queued.
async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ConvertResponse>)> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                submission.payload = field.bytes().await.map_err(multipart_error)?;
                submission.file_name = Some(file_name);
            }
            "style" => submission.style = Some(field.text().await.map_err(multipart_error)?),
            "resolution" => {
                submission.resolution = Some(field.text().await.map_err(multipart_error)?)
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let job_id = state.dispatcher.submit(submission).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ConvertResponse {
            job_id: job_id.to_string(),
        }),
    ))
}
