//! # Core Traits (Ports)
//!
//! The backend platform as seen by the services. Any adapter must implement
//! these traits to be wired into the binary.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::events::{ChangeEvent, Subscription};
use crate::models::{
    AuthUser, Comment, CommentId, Credential, MediaUpload, NewPost, Post, PostId, PostUpdate,
    Session, StoredMedia, UserId, UserProfile,
};

/// Post document collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Runs the counter transaction: reads the post counter, applies
    /// `next_post_number`, writes the counter and the new post atomically.
    async fn insert_numbered(&self, draft: NewPost) -> Result<Post>;
    async fn get(&self, id: PostId) -> Result<Option<Post>>;
    /// All posts, newest first.
    async fn list_newest_first(&self) -> Result<Vec<Post>>;
    async fn update(&self, id: PostId, update: PostUpdate) -> Result<Post>;
    /// Adds one to `views`. `NotFound` when the post does not exist.
    async fn increment_views(&self, id: PostId) -> Result<()>;
    /// Adds `delta` to `comment_count`, saturating at zero.
    async fn adjust_comment_count(&self, id: PostId, delta: i64) -> Result<()>;
    /// Removes the post and its whole comment sub-collection in one batch.
    async fn delete_with_comments(&self, id: PostId) -> Result<()>;
}

/// Comment sub-collection under each post.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, comment: Comment) -> Result<()>;
    async fn get(&self, post_id: PostId, id: CommentId) -> Result<Option<Comment>>;
    /// Every comment of a post, oldest first, deleted ones included.
    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<Comment>>;
    async fn update_text(
        &self,
        post_id: PostId,
        id: CommentId,
        text: String,
        at: DateTime<Utc>,
    ) -> Result<()>;
    /// Flips the soft-delete flag. Only one caller wins the transition; a
    /// comment that is already deleted yields `Conflict`.
    async fn mark_deleted(&self, post_id: PostId, id: CommentId, at: DateTime<Utc>) -> Result<()>;
}

/// User profile collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<UserProfile>>;
    /// Missing ids are skipped, not an error.
    async fn get_many(&self, ids: Vec<UserId>) -> Result<Vec<UserProfile>>;
    /// Insert or replace (merge semantics are applied by the caller).
    async fn upsert(&self, profile: UserProfile) -> Result<()>;
}

/// Credential store backing the `AuthProvider`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// `Conflict` when the email is already registered.
    async fn insert(&self, credential: Credential) -> Result<()>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>>;
}

/// File storage contract for post images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores the upload under `key` and returns its public locations.
    async fn put(&self, key: &str, upload: MediaUpload) -> Result<StoredMedia>;
    /// Removes the original and any derived files. Missing keys are `NotFound`.
    async fn delete(&self, key: &str) -> Result<()>;
    /// Raw bytes and content type, for serving.
    async fn read(&self, key: &str) -> Result<Option<(Bytes, mime::Mime)>>;
    fn url(&self, key: &str) -> String;
    fn thumbnail_url(&self, key: &str) -> String;
}

/// Live change notifications.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ChangeFeed: Send + Sync {
    fn publish(&self, event: ChangeEvent);
    fn subscribe(&self) -> Box<dyn Subscription>;
}

/// Identity contract: sign-up, sign-in, sign-out and token verification.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self, token: &str) -> Result<()>;
    async fn verify(&self, token: &str) -> Result<AuthUser>;
}
