//! Published result download.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/download/{name}` | Serve a file from the results directory as an attachment |

use std::path::Path as FsPath;

use axum::{
    Router,
    extract::{Path, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::services::ServeFile;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{name}", get(download))
}

/// A single path component with no directory parts.
///
/// Quotes and control characters are refused as well so the name can be
/// echoed inside the quoted `Content-Disposition` filename.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '"'])
        && !name.chars().any(char::is_control)
        && FsPath::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    if !is_plain_file_name(&name) {
        return Err(ApiError::not_found(format!("File not found: {}", name)));
    }

    let path = state.results_dir.join(&name);
    if !tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Err(ApiError::not_found(format!("File not found: {}", name)));
    }

    let mut response = match ServeFile::new(&path).try_call(req).await {
        Ok(response) => response.into_response(),
        Err(e) => return Err(ApiError::internal(format!("Failed to serve file: {}", e))),
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .map_err(|e| ApiError::internal(format!("Invalid header value: {e}")))?;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}
