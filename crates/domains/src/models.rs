//! # Domain Models
//!
//! These structs mirror the documents stored by the backend.
//! We use UUID v7 for time-ordered, globally unique identification.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PostId = Uuid;
pub type CommentId = Uuid;
pub type UserId = Uuid;

/// A bulletin-board post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Sequential, human-facing number allocated from the post counter
    pub post_number: u64,
    pub title: String,
    pub content: String,
    /// Storage key of the attached image, resolved to a URL by MediaStorage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    pub author_id: UserId,
    /// Not stored; filled in from the author's profile when read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub comment_count: u64,
}

impl Post {
    /// Builds the document written by the counter transaction.
    pub fn from_draft(id: PostId, post_number: u64, draft: NewPost, now: DateTime<Utc>) -> Self {
        Self {
            id,
            post_number,
            title: draft.title,
            content: draft.content,
            image_key: draft.image_key,
            author_id: draft.author_id,
            nickname: None,
            created_at: now,
            updated_at: None,
            views: 0,
            comment_count: 0,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at.is_some_and(|at| at != self.created_at)
    }
}

/// Input for the post counter transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_key: Option<String>,
    pub author_id: UserId,
}

/// Fields replaced by a post edit.
#[derive(Debug, Clone, PartialEq)]
pub struct PostUpdate {
    pub title: String,
    pub content: String,
    pub image_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// The read-modify-write body of the post counter transaction.
/// A missing counter document counts as zero.
pub fn next_post_number(current: Option<u64>) -> u64 {
    current.unwrap_or(0) + 1
}

/// A comment or a single-level reply under a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub text: String,
    pub author_id: UserId,
    /// Set for replies; always points at a top-level comment
    pub parent_id: Option<CommentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete flag. The document stays so replies remain attached.
    #[serde(default)]
    pub is_deleted: bool,
}

impl Comment {
    pub fn new(
        post_id: PostId,
        author_id: UserId,
        parent_id: Option<CommentId>,
        text: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            post_id,
            text,
            author_id,
            parent_id,
            nickname: None,
            created_at: now,
            updated_at: None,
            is_deleted: false,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at.is_some_and(|at| at != self.created_at)
    }
}

/// Public profile document of a registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(id: UserId, email: String, now: DateTime<Utc>) -> Self {
        Self { id, email, nickname: None, created_at: now, updated_at: None }
    }

    /// A user is fully onboarded once a non-blank nickname is set.
    pub fn is_onboarded(&self) -> bool {
        self.nickname.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// Stored sign-in secret. Never serialised to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub user_id: UserId,
    pub email: String,
    /// PHC-formatted argon2 hash
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Identity resolved from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}

/// Raw upload handed to MediaStorage.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Bytes,
    pub content_type: mime::Mime,
    pub file_name: Option<String>,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub key: String,
    pub url: String,
    pub thumbnail_url: String,
}
