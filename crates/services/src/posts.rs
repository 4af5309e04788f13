//! Post list, detail, create, edit and delete.

use async_trait::async_trait;
use chrono::Utc;
use domains::validation::require_text;
use domains::{
    AuthUser, ChangeEvent, DomainError, MediaUpload, NewPost, Post, PostId, PostUpdate, Result,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::live::{LiveQuery, Snapshot};
use crate::{ensure_owner, Backend, UNKNOWN_AUTHOR};

const MISSING_TITLE_OR_CONTENT: &str = "Please enter both a title and content.";

/// Form data of the create screen.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub image: Option<MediaUpload>,
}

/// What to do with the image of an edited post.
#[derive(Debug, Clone, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Replace(MediaUpload),
    Remove,
}

/// Form data of the edit screen.
#[derive(Debug, Clone)]
pub struct PostEdit {
    pub title: String,
    pub content: String,
    pub image: ImageChange,
}

/// A post as rendered by the list and detail screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub edited: bool,
}

/// Reply of the view-count function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewsIncremented {
    pub success: bool,
}

#[derive(Clone)]
pub struct PostService {
    backend: Backend,
}

impl PostService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Newest first, each with its author's nickname (empty when unset).
    pub async fn list_posts(&self) -> Result<Vec<PostView>> {
        let posts = self.backend.posts.list_newest_first().await?;
        let names = self.backend.nicknames(posts.iter().map(|p| p.author_id)).await?;

        Ok(posts
            .into_iter()
            .map(|mut post| {
                post.nickname = Some(names.get(&post.author_id).cloned().unwrap_or_default());
                self.view(post)
            })
            .collect())
    }

    pub fn watch_posts(&self) -> LiveQuery<PostListQuery> {
        LiveQuery::new(self.backend.feed.as_ref(), PostListQuery { service: self.clone() })
    }

    pub async fn get_post(&self, id: PostId) -> Result<PostView> {
        let mut post = self.require_post(id).await?;
        let nickname = self
            .backend
            .users
            .get(post.author_id)
            .await?
            .and_then(|p| p.nickname)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        post.nickname = Some(nickname);
        Ok(self.view(post))
    }

    /// Yields `None` once the post has been deleted.
    pub fn watch_post(&self, id: PostId) -> LiveQuery<PostQuery> {
        LiveQuery::new(self.backend.feed.as_ref(), PostQuery { service: self.clone(), id })
    }

    /// Uploads the image (if any), then allocates the next post number and
    /// writes the post inside the counter transaction.
    pub async fn create_post(&self, author: &AuthUser, draft: PostDraft) -> Result<PostView> {
        let title = require_text(&draft.title, MISSING_TITLE_OR_CONTENT)?;
        let content = require_text(&draft.content, MISSING_TITLE_OR_CONTENT)?;

        let image_key = match draft.image {
            Some(upload) => Some(self.upload_image(upload).await?),
            None => None,
        };

        let new_post = NewPost { title, content, image_key: image_key.clone(), author_id: author.id };
        let post = match self.backend.posts.insert_numbered(new_post).await {
            Ok(post) => post,
            Err(err) => {
                // The post never existed; don't leave its image behind.
                self.discard_image(image_key.as_deref()).await;
                return Err(err);
            }
        };

        info!(post_id = %post.id, post_number = post.post_number, "post created");
        self.backend.feed.publish(ChangeEvent::PostsChanged);
        self.get_post(post.id).await
    }

    pub async fn update_post(&self, actor: &AuthUser, id: PostId, edit: PostEdit) -> Result<PostView> {
        let post = self.require_post(id).await?;
        ensure_owner(actor, post.author_id, "post")?;
        let title = require_text(&edit.title, MISSING_TITLE_OR_CONTENT)?;
        let content = require_text(&edit.content, MISSING_TITLE_OR_CONTENT)?;

        // New image first, old one only after the post stops pointing at it.
        let (image_key, uploaded) = match edit.image {
            ImageChange::Keep => (post.image_key.clone(), None),
            ImageChange::Replace(upload) => {
                let key = self.upload_image(upload).await?;
                (Some(key.clone()), Some(key))
            }
            ImageChange::Remove => (None, None),
        };
        let superseded = post.image_key.filter(|old| image_key.as_deref() != Some(old.as_str()));

        let update = PostUpdate { title, content, image_key, updated_at: Utc::now() };
        if let Err(err) = self.backend.posts.update(id, update).await {
            self.discard_image(uploaded.as_deref()).await;
            return Err(err);
        }
        self.discard_image(superseded.as_deref()).await;

        info!(post_id = %id, "post updated");
        self.backend.feed.publish(ChangeEvent::PostChanged(id));
        self.get_post(id).await
    }

    /// Removes the image, then the post and all of its comments in one batch.
    pub async fn delete_post(&self, actor: &AuthUser, id: PostId) -> Result<()> {
        let post = self.require_post(id).await?;
        ensure_owner(actor, post.author_id, "post")?;

        self.discard_image(post.image_key.as_deref()).await;
        self.backend.posts.delete_with_comments(id).await?;

        info!(post_id = %id, post_number = post.post_number, "post deleted");
        self.backend.feed.publish(ChangeEvent::PostChanged(id));
        self.backend.feed.publish(ChangeEvent::CommentsChanged(id));
        Ok(())
    }

    /// The remote view-count function. Takes the raw `postId` argument.
    pub async fn increment_views(&self, post_id: &str) -> Result<ViewsIncremented> {
        let raw = post_id.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("postId is required."));
        }
        let id = Uuid::parse_str(raw).map_err(|_| DomainError::validation("postId is invalid."))?;

        self.backend.posts.increment_views(id).await?;
        self.backend.feed.publish(ChangeEvent::PostChanged(id));
        Ok(ViewsIncremented { success: true })
    }

    async fn require_post(&self, id: PostId) -> Result<Post> {
        self.backend
            .posts
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", id))
    }

    async fn upload_image(&self, upload: MediaUpload) -> Result<String> {
        if upload.content_type.type_() != mime::IMAGE {
            return Err(DomainError::validation("Only image files can be attached."));
        }
        let name = sanitize_file_name(upload.file_name.as_deref().unwrap_or("img"));
        // Two uploads in the same millisecond must not share a key.
        let nonce = Uuid::new_v4().simple().to_string();
        let key = format!("posts/{}-{}-{}", Utc::now().timestamp_millis(), &nonce[..8], name);
        let stored = self.backend.media.put(&key, upload).await?;
        Ok(stored.key)
    }

    /// Image removal never blocks the operation that triggered it.
    async fn discard_image(&self, key: Option<&str>) {
        let Some(key) = key else { return };
        if let Err(err) = self.backend.media.delete(key).await {
            warn!(key, error = %err, "failed to delete image");
        }
    }

    fn view(&self, post: Post) -> PostView {
        let (image_url, thumbnail_url) = match post.image_key.as_deref() {
            Some(key) => (
                Some(self.backend.media.url(key)),
                Some(self.backend.media.thumbnail_url(key)),
            ),
            None => (None, None),
        };
        let edited = post.is_edited();
        PostView { post, image_url, thumbnail_url, edited }
    }
}

/// Keeps storage keys to a safe alphabet.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "img".to_string()
    } else {
        cleaned.to_string()
    }
}

pub struct PostListQuery {
    service: PostService,
}

#[async_trait]
impl Snapshot for PostListQuery {
    type Output = Vec<PostView>;

    async fn load(&self) -> Result<Vec<PostView>> {
        self.service.list_posts().await
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        event.affects_post_list()
    }
}

pub struct PostQuery {
    service: PostService,
    id: PostId,
}

#[async_trait]
impl Snapshot for PostQuery {
    type Output = Option<PostView>;

    async fn load(&self) -> Result<Option<PostView>> {
        match self.service.get_post(self.id).await {
            Ok(view) => Ok(Some(view)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        event.affects_post(self.id)
    }
}
