//! Post list, detail, create / edit / delete and view counting.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use domains::MediaUpload;
use services::{Action, ImageChange, PostDraft, PostEdit, PostView, ViewsIncremented};

use super::parse_id;
use crate::error::{fail, ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::sse::live_events;
use crate::state::AppState;

/// Fields of the post editor form.
#[derive(Debug, Default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    pub image: Option<MediaUpload>,
    pub remove_image: bool,
}

impl PostForm {
    /// Reads `title`, `content`, `image` and `remove_image`; other fields are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = field.text().await.map_err(unreadable)?,
                "content" => form.content = field.text().await.map_err(unreadable)?,
                "remove_image" => {
                    let value = field.text().await.map_err(unreadable)?;
                    form.remove_image = matches!(value.trim(), "true" | "1" | "on");
                }
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let declared = field.content_type().and_then(|ct| ct.parse::<mime::Mime>().ok());
                    let bytes: Bytes = field.bytes().await.map_err(unreadable)?;
                    // Browsers send an empty part when no file was picked.
                    if bytes.is_empty() {
                        continue;
                    }
                    let content_type = declared.unwrap_or_else(|| {
                        file_name
                            .as_deref()
                            .map(|n| mime_guess::from_path(n).first_or_octet_stream())
                            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
                    });
                    form.image = Some(MediaUpload { bytes, content_type, file_name });
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_draft(self) -> PostDraft {
        PostDraft { title: self.title, content: self.content, image: self.image }
    }

    /// A new file wins over `remove_image`.
    fn into_edit(self) -> PostEdit {
        let image = match (self.image, self.remove_image) {
            (Some(upload), _) => ImageChange::Replace(upload),
            (None, true) => ImageChange::Remove,
            (None, false) => ImageChange::Keep,
        };
        PostEdit { title: self.title, content: self.content, image }
    }
}

fn unreadable(err: axum::extract::multipart::MultipartError) -> ApiError {
    tracing::debug!(error = %err, "multipart rejected");
    ApiError::bad_request("The upload could not be read.")
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<PostView>> {
    let posts = state.posts.list_posts().await.map_err(fail(Action::LoadPosts))?;
    Ok(Json(posts))
}

pub async fn watch_list(State(state): State<AppState>) -> impl IntoResponse {
    live_events(state.posts.watch_posts(), Action::LoadPosts)
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let form = PostForm::read(multipart).await?;
    let post = state
        .posts
        .create_post(&current.user, form.into_draft())
        .await
        .map_err(fail(Action::CreatePost))?;
    state.metrics.posts_created.inc();
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<PostView> {
    let id = parse_id(&id, "Post", Action::LoadPost)?;
    let post = state.posts.get_post(id).await.map_err(fail(Action::LoadPost))?;
    Ok(Json(post))
}

pub async fn watch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Post", Action::LoadPost)?;
    Ok(live_events(state.posts.watch_post(id), Action::LoadPost))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    multipart: Multipart,
) -> ApiResult<PostView> {
    let id = parse_id(&id, "Post", Action::UpdatePost)?;
    let form = PostForm::read(multipart).await?;
    let post = state
        .posts
        .update_post(&current.user, id, form.into_edit())
        .await
        .map_err(fail(Action::UpdatePost))?;
    Ok(Json(post))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Post", Action::DeletePost)?;
    state
        .posts
        .delete_post(&current.user, id)
        .await
        .map_err(fail(Action::DeletePost))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Takes the raw id: the service reports missing and malformed ids itself.
pub async fn increment_views(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ViewsIncremented> {
    let result = state
        .posts
        .increment_views(&id)
        .await
        .map_err(fail(Action::IncrementViews))?;
    state.metrics.views_incremented.inc();
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> MediaUpload {
        MediaUpload {
            bytes: Bytes::from_static(b"img"),
            content_type: mime::IMAGE_PNG,
            file_name: None,
        }
    }

    #[test]
    fn edit_image_change_precedence() {
        let form = PostForm { image: Some(upload()), remove_image: true, ..Default::default() };
        assert!(matches!(form.into_edit().image, ImageChange::Replace(_)));

        let form = PostForm { remove_image: true, ..Default::default() };
        assert!(matches!(form.into_edit().image, ImageChange::Remove));

        assert!(matches!(PostForm::default().into_edit().image, ImageChange::Keep));
    }
}
