//! Serves stored uploads and their thumbnails.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use domains::DomainError;
use services::Action;

use crate::error::{fail, ApiError};
use crate::state::AppState;

pub async fn serve(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let Some((bytes, content_type)) = state.media.read(&key).await.map_err(fail(Action::LoadPost))? else {
        return Err(ApiError::from_domain(Action::LoadPost, DomainError::not_found("Media", key)));
    };

    let content_type = HeaderValue::from_str(content_type.as_ref())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    // Keys embed an upload timestamp, so content under a key never changes.
    let headers = [
        (CONTENT_TYPE, content_type),
        (CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000, immutable")),
    ];
    Ok((headers, bytes).into_response())
}
