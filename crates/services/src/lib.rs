//! # services
//!
//! The view-model layer of the community board. Each service corresponds to
//! a group of screens: it issues reads, writes and subscriptions against the
//! backend ports and shapes the returned documents into view state.

pub mod auth;
pub mod comments;
pub mod live;
pub mod messages;
pub mod posts;

use std::collections::HashMap;
use std::sync::Arc;

use domains::{
    AuthProvider, AuthUser, ChangeFeed, CommentRepository, DomainError, MediaStorage,
    PostRepository, Result, UserId, UserRepository,
};

pub use auth::AuthService;
pub use comments::{CommentService, CommentThread, CommentView};
pub use live::LiveQuery;
pub use messages::{user_message, Action};
pub use posts::{ImageChange, PostDraft, PostEdit, PostService, PostView, ViewsIncremented};

/// Shown wherever an author has no resolvable nickname.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Handles to every backend port. Cheap to clone.
#[derive(Clone)]
pub struct Backend {
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub media: Arc<dyn MediaStorage>,
    pub feed: Arc<dyn ChangeFeed>,
    pub auth: Arc<dyn AuthProvider>,
}

impl Backend {
    /// Resolves the nicknames of a set of authors in one batch.
    /// Authors without a profile or with a blank nickname are absent from the map.
    pub(crate) async fn nicknames(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<HashMap<UserId, String>> {
        let mut unique: Vec<UserId> = ids.into_iter().collect();
        unique.sort_unstable();
        unique.dedup();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let profiles = self.users.get_many(unique).await?;
        Ok(profiles
            .into_iter()
            .filter_map(|p| {
                let nick = p.nickname?.trim().to_string();
                (!nick.is_empty()).then_some((p.id, nick))
            })
            .collect())
    }
}

pub(crate) fn ensure_owner(actor: &AuthUser, owner: UserId, what: &str) -> Result<()> {
    if actor.id != owner {
        return Err(DomainError::Forbidden(format!(
            "only the author may modify this {what}"
        )));
    }
    Ok(())
}
