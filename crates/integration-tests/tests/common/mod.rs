//! Shared wiring: every port backed by the in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;

use auth_adapters::{LockoutPolicy, OpaqueTokens, PasswordAuthProvider};
use bytes::Bytes;
use chrono::{Duration, Utc};
use domains::{AuthUser, MediaUpload, UserProfile, UserRepository};
use services::{AuthService, Backend, CommentService, PostDraft, PostService};
use storage_adapters::{BroadcastFeed, MemoryMedia, MemoryStore};
use uuid::Uuid;

pub struct TestBoard {
    pub store: MemoryStore,
    pub media: Arc<MemoryMedia>,
    pub feed: Arc<BroadcastFeed>,
    pub backend: Backend,
    pub auth: AuthService,
    pub posts: PostService,
    pub comments: CommentService,
}

impl TestBoard {
    pub fn new() -> Self {
        Self::with_lockout(LockoutPolicy::default())
    }

    pub fn with_lockout(policy: LockoutPolicy) -> Self {
        let store = MemoryStore::new();
        let media = Arc::new(MemoryMedia::new("/media"));
        let feed = Arc::new(BroadcastFeed::default());
        let provider = PasswordAuthProvider::new(
            Arc::new(store.clone()),
            Arc::new(OpaqueTokens::new(Duration::hours(1))),
            policy,
        );
        let backend = Backend {
            posts: Arc::new(store.clone()),
            comments: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            media: media.clone(),
            feed: feed.clone(),
            auth: Arc::new(provider),
        };
        Self {
            auth: AuthService::new(backend.clone()),
            posts: PostService::new(backend.clone()),
            comments: CommentService::new(backend.clone()),
            store,
            media,
            feed,
            backend,
        }
    }

    /// A profile without going through password hashing.
    pub async fn user(&self, email: &str, nickname: Option<&str>) -> AuthUser {
        let user = AuthUser { id: Uuid::now_v7(), email: email.to_string() };
        let mut profile = UserProfile::new(user.id, user.email.clone(), Utc::now());
        profile.nickname = nickname.map(str::to_string);
        self.store.upsert(profile).await.unwrap();
        user
    }
}

pub fn draft(title: &str, image: Option<MediaUpload>) -> PostDraft {
    PostDraft { title: title.to_string(), content: format!("{title} body"), image }
}

pub fn png(name: &str) -> MediaUpload {
    MediaUpload {
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"),
        content_type: mime::IMAGE_PNG,
        file_name: Some(name.to_string()),
    }
}
