//! Live change notifications.
//!
//! The backend pushes a `ChangeEvent` after every committed write. Readers
//! hold a `Subscription` for as long as they want updates; dropping it is
//! the unsubscribe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::PostId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "post_id", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// The post collection changed (insert, delete, or a listed field).
    PostsChanged,
    /// A single post document changed.
    PostChanged(PostId),
    /// The comment sub-collection of a post changed.
    CommentsChanged(PostId),
    /// The subscriber missed events; everything must be re-read.
    Resync,
}

impl ChangeEvent {
    pub fn affects_post_list(&self) -> bool {
        matches!(
            self,
            ChangeEvent::PostsChanged | ChangeEvent::PostChanged(_) | ChangeEvent::Resync
        )
    }

    pub fn affects_post(&self, id: PostId) -> bool {
        match self {
            ChangeEvent::PostChanged(p) => *p == id,
            ChangeEvent::Resync => true,
            _ => false,
        }
    }

    pub fn affects_comments(&self, id: PostId) -> bool {
        match self {
            ChangeEvent::CommentsChanged(p) => *p == id,
            ChangeEvent::Resync => true,
            _ => false,
        }
    }
}

/// A live stream of change events.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next event. `None` once the feed has shut down.
    async fn recv(&mut self) -> Option<ChangeEvent>;
}
