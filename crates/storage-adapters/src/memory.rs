//! # In-memory document store
//!
//! Implements every document port on concurrent maps. The post counter is
//! the only cross-document invariant and is serialised behind a mutex, which
//! plays the part of the backend transaction.

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    next_post_number, Comment, CommentId, CommentRepository, Credential, CredentialRepository,
    DomainError, NewPost, Post, PostId, PostRepository, PostUpdate, Result, UserId,
    UserProfile, UserRepository,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ALREADY_DELETED;

#[derive(Default)]
struct Inner {
    posts: DashMap<PostId, Post>,
    comments: DashMap<CommentId, Comment>,
    users: DashMap<UserId, UserProfile>,
    credentials: DashMap<String, Credential>,
    /// `None` until the first post is created.
    post_counter: Mutex<Option<u64>>,
}

/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn comment_in_post(&self, post_id: PostId, id: CommentId) -> Option<Comment> {
        self.inner
            .comments
            .get(&id)
            .filter(|c| c.post_id == post_id)
            .map(|c| c.clone())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert_numbered(&self, draft: NewPost) -> Result<Post> {
        let mut counter = self.inner.post_counter.lock().await;
        let number = next_post_number(*counter);

        let post = Post::from_draft(Uuid::now_v7(), number, draft, Utc::now());
        self.inner.posts.insert(post.id, post.clone());
        *counter = Some(number);
        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.inner.posts.get(&id).map(|p| p.clone()))
    }

    async fn list_newest_first(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.inner.posts.iter().map(|p| p.clone()).collect();
        posts.sort_by_key(|p| (Reverse(p.created_at), Reverse(p.post_number)));
        Ok(posts)
    }

    async fn update(&self, id: PostId, update: PostUpdate) -> Result<Post> {
        let mut post = self
            .inner
            .posts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Post", id))?;
        post.title = update.title;
        post.content = update.content;
        post.image_key = update.image_key;
        post.updated_at = Some(update.updated_at);
        Ok(post.clone())
    }

    async fn increment_views(&self, id: PostId) -> Result<()> {
        let mut post = self
            .inner
            .posts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Post", id))?;
        post.views += 1;
        Ok(())
    }

    async fn adjust_comment_count(&self, id: PostId, delta: i64) -> Result<()> {
        let mut post = self
            .inner
            .posts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Post", id))?;
        post.comment_count = post.comment_count.saturating_add_signed(delta);
        Ok(())
    }

    async fn delete_with_comments(&self, id: PostId) -> Result<()> {
        self.inner
            .posts
            .remove(&id)
            .ok_or_else(|| DomainError::not_found("Post", id))?;
        self.inner.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert(&self, comment: Comment) -> Result<()> {
        if !self.inner.posts.contains_key(&comment.post_id) {
            return Err(DomainError::not_found("Post", comment.post_id));
        }
        self.inner.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn get(&self, post_id: PostId, id: CommentId) -> Result<Option<Comment>> {
        Ok(self.comment_in_post(post_id, id))
    }

    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .inner
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.clone())
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn update_text(
        &self,
        post_id: PostId,
        id: CommentId,
        text: String,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut comment = self
            .inner
            .comments
            .get_mut(&id)
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| DomainError::not_found("Comment", id))?;
        comment.text = text;
        comment.updated_at = Some(at);
        Ok(())
    }

    async fn mark_deleted(&self, post_id: PostId, id: CommentId, at: DateTime<Utc>) -> Result<()> {
        let mut comment = self
            .inner
            .comments
            .get_mut(&id)
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| DomainError::not_found("Comment", id))?;
        if comment.is_deleted {
            return Err(DomainError::Conflict(ALREADY_DELETED.into()));
        }
        comment.is_deleted = true;
        comment.updated_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get(&self, id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.inner.users.get(&id).map(|u| u.clone()))
    }

    async fn get_many(&self, ids: Vec<UserId>) -> Result<Vec<UserProfile>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn upsert(&self, profile: UserProfile) -> Result<()> {
        self.inner.users.insert(profile.id, profile);
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn insert(&self, credential: Credential) -> Result<()> {
        match self.inner.credentials.entry(credential.email.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "credential already exists for {}",
                credential.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(credential);
                Ok(())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        Ok(self.inner.credentials.get(email).map(|c| c.clone()))
    }
}
