use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use services::{Action, CommentThread, CommentView};
use uuid::Uuid;

use super::parse_id;
use crate::error::{fail, ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::sse::live_events;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCommentRequest {
    #[serde(default)]
    pub text: String,
    /// Present for replies.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    #[serde(default)]
    pub text: String,
}

pub async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Vec<CommentThread>> {
    let post_id = parse_id(&post_id, "Post", Action::LoadComments)?;
    let threads = state
        .comments
        .list_thread(post_id)
        .await
        .map_err(fail(Action::LoadComments))?;
    Ok(Json(threads))
}

pub async fn watch(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "Post", Action::LoadComments)?;
    Ok(live_events(state.comments.watch_thread(post_id), Action::LoadComments))
}

pub async fn create(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
    Json(body): Json<NewCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let action = if body.parent_id.is_some() { Action::AddReply } else { Action::AddComment };
    let post_id = parse_id(&post_id, "Post", action)?;

    let created = match body.parent_id {
        Some(parent_id) => {
            state
                .comments
                .add_reply(&current.user, post_id, parent_id, &body.text)
                .await
        }
        None => state.comments.add_comment(&current.user, post_id, &body.text).await,
    }
    .map_err(fail(action))?;

    state.metrics.comments_created.inc();
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    current: CurrentUser,
    Json(body): Json<EditCommentRequest>,
) -> ApiResult<CommentView> {
    let post_id = parse_id(&post_id, "Post", Action::EditComment)?;
    let comment_id = parse_id(&comment_id, "Comment", Action::EditComment)?;
    let edited = state
        .comments
        .edit_comment(&current.user, post_id, comment_id, &body.text)
        .await
        .map_err(fail(Action::EditComment))?;
    Ok(Json(edited))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    let post_id = parse_id(&post_id, "Post", Action::DeleteComment)?;
    let comment_id = parse_id(&comment_id, "Comment", Action::DeleteComment)?;
    state
        .comments
        .delete_comment(&current.user, post_id, comment_id)
        .await
        .map_err(fail(Action::DeleteComment))?;
    Ok(StatusCode::NO_CONTENT)
}
