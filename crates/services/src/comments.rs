//! Comments and single-level replies on the post detail screen.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::validation::require_text;
use domains::{
    AuthUser, ChangeEvent, Comment, CommentId, DomainError, PostId, Result, UserId,
};
use serde::Serialize;
use tracing::info;

use crate::live::{LiveQuery, Snapshot};
use crate::{ensure_owner, Backend, UNKNOWN_AUTHOR};

/// Rendered in place of a soft-deleted comment's text.
pub const DELETED_PLACEHOLDER: &str = "This comment has been deleted.";

const EMPTY_COMMENT: &str = "Please enter a comment.";

/// A comment as rendered: deleted comments never expose their text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub parent_id: Option<CommentId>,
    pub nickname: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub edited: bool,
}

impl CommentView {
    fn from_comment(comment: Comment, nickname: String) -> Self {
        let edited = !comment.is_deleted && comment.is_edited();
        let text = if comment.is_deleted { DELETED_PLACEHOLDER.to_string() } else { comment.text };
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            parent_id: comment.parent_id,
            nickname,
            text,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            is_deleted: comment.is_deleted,
            edited,
        }
    }
}

/// A top-level comment with its replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Groups comments (already in display order) into top-level threads.
///
/// Replies keep their relative order under their parent. A reply whose
/// parent is not in `comments` is dropped.
pub fn group_threads(comments: Vec<CommentView>) -> Vec<CommentThread> {
    let (roots, replies): (Vec<_>, Vec<_>) =
        comments.into_iter().partition(|c| c.parent_id.is_none());

    let index: HashMap<CommentId, usize> =
        roots.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let mut threads: Vec<CommentThread> = roots
        .into_iter()
        .map(|comment| CommentThread { comment, replies: Vec::new() })
        .collect();

    for reply in replies {
        let parent = reply.parent_id.and_then(|p| index.get(&p).copied());
        if let Some(i) = parent {
            threads[i].replies.push(reply);
        }
    }
    threads
}

#[derive(Clone)]
pub struct CommentService {
    backend: Backend,
}

impl CommentService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Oldest first, grouped by top-level comment.
    pub async fn list_thread(&self, post_id: PostId) -> Result<Vec<CommentThread>> {
        let mut comments = self.backend.comments.list_for_post(post_id).await?;
        comments.sort_by_key(|c| c.created_at);
        let names = self.backend.nicknames(comments.iter().map(|c| c.author_id)).await?;

        let views = comments
            .into_iter()
            .map(|c| {
                let nick = names.get(&c.author_id).cloned();
                CommentView::from_comment(c, nick.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()))
            })
            .collect();
        Ok(group_threads(views))
    }

    pub fn watch_thread(&self, post_id: PostId) -> LiveQuery<ThreadQuery> {
        LiveQuery::new(self.backend.feed.as_ref(), ThreadQuery { service: self.clone(), post_id })
    }

    pub async fn add_comment(&self, author: &AuthUser, post_id: PostId, text: &str) -> Result<CommentView> {
        let text = require_text(text, EMPTY_COMMENT)?;
        self.require_post(post_id).await?;

        let comment = Comment::new(post_id, author.id, None, text, Utc::now());
        self.insert_counted(author, comment).await
    }

    /// Replies always hang off a top-level comment: answering a reply
    /// attaches to that reply's parent.
    pub async fn add_reply(
        &self,
        author: &AuthUser,
        post_id: PostId,
        parent_id: CommentId,
        text: &str,
    ) -> Result<CommentView> {
        let text = require_text(text, EMPTY_COMMENT)?;
        self.require_post(post_id).await?;
        let parent = self.require_comment(post_id, parent_id).await?;
        if parent.is_deleted {
            return Err(DomainError::validation("Cannot reply to a deleted comment."));
        }

        let root = parent.parent_id.unwrap_or(parent.id);
        let comment = Comment::new(post_id, author.id, Some(root), text, Utc::now());
        self.insert_counted(author, comment).await
    }

    pub async fn edit_comment(
        &self,
        actor: &AuthUser,
        post_id: PostId,
        comment_id: CommentId,
        text: &str,
    ) -> Result<CommentView> {
        let text = require_text(text, EMPTY_COMMENT)?;
        let mut comment = self.require_comment(post_id, comment_id).await?;
        ensure_owner(actor, comment.author_id, "comment")?;
        if comment.is_deleted {
            return Err(DomainError::Conflict(DELETED_PLACEHOLDER.to_string()));
        }

        let now = Utc::now();
        self.backend
            .comments
            .update_text(post_id, comment_id, text.clone(), now)
            .await?;
        self.backend.feed.publish(ChangeEvent::CommentsChanged(post_id));

        comment.text = text;
        comment.updated_at = Some(now);
        let nickname = self.nickname_of(actor).await?;
        Ok(CommentView::from_comment(comment, nickname))
    }

    /// Soft delete: the document stays so its replies remain attached.
    pub async fn delete_comment(
        &self,
        actor: &AuthUser,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<()> {
        let comment = self.require_comment(post_id, comment_id).await?;
        ensure_owner(actor, comment.author_id, "comment")?;
        if comment.is_deleted {
            return Err(DomainError::Conflict("This comment has already been deleted.".into()));
        }

        // A concurrent delete may have won since the read; the store reports it as Conflict.
        self.backend.comments.mark_deleted(post_id, comment_id, Utc::now()).await?;
        self.backend.posts.adjust_comment_count(post_id, -1).await?;

        info!(%post_id, %comment_id, "comment deleted");
        self.backend.feed.publish(ChangeEvent::CommentsChanged(post_id));
        self.backend.feed.publish(ChangeEvent::PostChanged(post_id));
        Ok(())
    }

    async fn insert_counted(&self, author: &AuthUser, comment: Comment) -> Result<CommentView> {
        let post_id = comment.post_id;
        self.backend.comments.insert(comment.clone()).await?;
        self.backend.posts.adjust_comment_count(post_id, 1).await?;

        info!(%post_id, comment_id = %comment.id, reply = comment.is_reply(), "comment added");
        self.backend.feed.publish(ChangeEvent::CommentsChanged(post_id));
        self.backend.feed.publish(ChangeEvent::PostChanged(post_id));

        let nickname = self.nickname_of(author).await?;
        Ok(CommentView::from_comment(comment, nickname))
    }

    async fn nickname_of(&self, user: &AuthUser) -> Result<String> {
        let names = self.backend.nicknames([user.id]).await?;
        Ok(names.get(&user.id).cloned().unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()))
    }

    async fn require_post(&self, post_id: PostId) -> Result<()> {
        match self.backend.posts.get(post_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("Post", post_id)),
        }
    }

    async fn require_comment(&self, post_id: PostId, id: CommentId) -> Result<Comment> {
        self.backend
            .comments
            .get(post_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id))
    }
}

pub struct ThreadQuery {
    service: CommentService,
    post_id: PostId,
}

#[async_trait]
impl Snapshot for ThreadQuery {
    type Output = Vec<CommentThread>;

    async fn load(&self) -> Result<Vec<CommentThread>> {
        self.service.list_thread(self.post_id).await
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        event.affects_comments(self.post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{user, Mocks};
    use chrono::Duration;
    use domains::{NewPost, Post};
    use uuid::Uuid;

    fn view(id: CommentId, parent: Option<CommentId>, deleted: bool) -> CommentView {
        let now = Utc::now();
        let mut c = Comment::new(Uuid::nil(), Uuid::nil(), parent, format!("text-{id}"), now);
        c.id = id;
        c.is_deleted = deleted;
        CommentView::from_comment(c, "n".into())
    }

    fn some_post(post_id: PostId) -> Post {
        let draft = NewPost {
            title: "t".into(),
            content: "c".into(),
            image_key: None,
            author_id: Uuid::now_v7(),
        };
        Post::from_draft(post_id, 1, draft, Utc::now())
    }

    #[test]
    fn replies_attach_to_their_parent_in_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (r1, r2, r3) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let threads = group_threads(vec![
            view(a, None, false),
            view(r1, Some(a), false),
            view(b, None, false),
            view(r2, Some(b), false),
            view(r3, Some(a), false),
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, a);
        let a_replies: Vec<_> = threads[0].replies.iter().map(|r| r.id).collect();
        assert_eq!(a_replies, vec![r1, r3]);
        assert_eq!(threads[1].replies.len(), 1);
    }

    #[test]
    fn orphan_replies_are_dropped() {
        let a = Uuid::now_v7();
        let threads = group_threads(vec![
            view(a, None, false),
            view(Uuid::now_v7(), Some(Uuid::now_v7()), false),
        ]);
        assert_eq!(threads.len(), 1);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn deleted_parent_keeps_replies_and_hides_text() {
        let a = Uuid::now_v7();
        let r = Uuid::now_v7();
        let threads = group_threads(vec![view(a, None, true), view(r, Some(a), false)]);
        assert_eq!(threads[0].comment.text, DELETED_PLACEHOLDER);
        assert!(threads[0].comment.is_deleted);
        assert_eq!(threads[0].replies[0].id, r);
    }

    #[tokio::test]
    async fn list_thread_sorts_and_falls_back_to_unknown() {
        let post_id = Uuid::now_v7();
        let now = Utc::now();
        let mut late = Comment::new(post_id, Uuid::now_v7(), None, "late".into(), now);
        late.created_at = now + Duration::seconds(10);
        let early = Comment::new(post_id, Uuid::now_v7(), None, "early".into(), now);

        let mut m = Mocks::new();
        m.comments
            .expect_list_for_post()
            .returning(move |_| Ok(vec![late.clone(), early.clone()]));
        let svc = CommentService::new(m.into_backend());

        let threads = svc.list_thread(post_id).await.unwrap();
        assert_eq!(threads[0].comment.text, "early");
        assert_eq!(threads[1].comment.text, "late");
        assert_eq!(threads[0].comment.nickname, UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn add_comment_increments_count() {
        let post_id = Uuid::now_v7();
        let mut m = Mocks::new();
        m.posts.expect_get().returning(move |id| Ok(Some(some_post(id))));
        m.comments
            .expect_insert()
            .withf(|c| c.parent_id.is_none() && c.text == "hello")
            .times(1)
            .returning(|_| Ok(()));
        m.posts
            .expect_adjust_comment_count()
            .withf(move |id, d| *id == post_id && *d == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = CommentService::new(m.into_backend());
        let view = svc.add_comment(&user("a@b.co"), post_id, "  hello ").await.unwrap();
        assert_eq!(view.text, "hello");
        assert!(!view.edited);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let mut m = Mocks::new();
        m.comments.expect_insert().never();
        let svc = CommentService::new(m.into_backend());
        let err = svc.add_comment(&user("a@b.co"), Uuid::now_v7(), "   ").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(m) if m == EMPTY_COMMENT));
    }

    #[tokio::test]
    async fn reply_to_reply_attaches_to_root() {
        let post_id = Uuid::now_v7();
        let root = Uuid::now_v7();
        let mut parent = Comment::new(post_id, Uuid::now_v7(), Some(root), "mid".into(), Utc::now());
        parent.id = Uuid::now_v7();
        let parent_id = parent.id;

        let mut m = Mocks::new();
        m.posts.expect_get().returning(move |id| Ok(Some(some_post(id))));
        m.comments.expect_get().returning(move |_, _| Ok(Some(parent.clone())));
        m.comments
            .expect_insert()
            .withf(move |c| c.parent_id == Some(root))
            .times(1)
            .returning(|_| Ok(()));
        m.posts.expect_adjust_comment_count().returning(|_, _| Ok(()));

        let svc = CommentService::new(m.into_backend());
        let v = svc.add_reply(&user("a@b.co"), post_id, parent_id, "deep").await.unwrap();
        assert_eq!(v.parent_id, Some(root));
    }

    #[tokio::test]
    async fn cannot_reply_to_deleted_comment() {
        let post_id = Uuid::now_v7();
        let mut parent = Comment::new(post_id, Uuid::now_v7(), None, "gone".into(), Utc::now());
        parent.is_deleted = true;
        let mut m = Mocks::new();
        m.posts.expect_get().returning(move |id| Ok(Some(some_post(id))));
        m.comments.expect_get().returning(move |_, _| Ok(Some(parent.clone())));
        m.comments.expect_insert().never();

        let svc = CommentService::new(m.into_backend());
        let err = svc
            .add_reply(&user("a@b.co"), post_id, Uuid::now_v7(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn delete_twice_is_a_conflict_without_second_decrement() {
        let me = user("a@b.co");
        let post_id = Uuid::now_v7();
        let mut comment = Comment::new(post_id, me.id, None, "bye".into(), Utc::now());
        comment.is_deleted = true;
        let mut m = Mocks::new();
        m.comments.expect_get().returning(move |_, _| Ok(Some(comment.clone())));
        m.comments.expect_mark_deleted().never();
        m.posts.expect_adjust_comment_count().never();

        let svc = CommentService::new(m.into_backend());
        let err = svc.delete_comment(&me, post_id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn racing_deletes_decrement_once() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let me = user("a@b.co");
        let post_id = Uuid::now_v7();
        let comment = Comment::new(post_id, me.id, None, "bye".into(), Utc::now());
        let comment_id = comment.id;
        let taken = AtomicBool::new(false);

        let mut m = Mocks::new();
        // Both callers read the comment before either writes.
        m.comments.expect_get().returning(move |_, _| Ok(Some(comment.clone())));
        m.comments.expect_mark_deleted().times(2).returning(move |_, _, _| {
            if taken.swap(true, Ordering::SeqCst) {
                Err(DomainError::Conflict("already deleted".into()))
            } else {
                Ok(())
            }
        });
        m.posts
            .expect_adjust_comment_count()
            .withf(|_, d| *d == -1)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = CommentService::new(m.into_backend());
        let (first, second) = tokio::join!(
            svc.delete_comment(&me, post_id, comment_id),
            svc.delete_comment(&me, post_id, comment_id),
        );
        let conflicts = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(DomainError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1);
        assert!(first.is_ok() || second.is_ok());
    }

    #[tokio::test]
    async fn delete_marks_and_decrements() {
        let me = user("a@b.co");
        let post_id = Uuid::now_v7();
        let comment = Comment::new(post_id, me.id, None, "bye".into(), Utc::now());
        let cid = comment.id;
        let mut m = Mocks::new();
        m.comments.expect_get().returning(move |_, _| Ok(Some(comment.clone())));
        m.comments
            .expect_mark_deleted()
            .withf(move |p, c, _| *p == post_id && *c == cid)
            .times(1)
            .returning(|_, _, _| Ok(()));
        m.posts
            .expect_adjust_comment_count()
            .withf(|_, d| *d == -1)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = CommentService::new(m.into_backend());
        svc.delete_comment(&me, post_id, cid).await.unwrap();
    }

    #[tokio::test]
    async fn strangers_cannot_edit() {
        let post_id = Uuid::now_v7();
        let comment = Comment::new(post_id, Uuid::now_v7(), None, "mine".into(), Utc::now());
        let mut m = Mocks::new();
        m.comments.expect_get().returning(move |_, _| Ok(Some(comment.clone())));
        m.comments.expect_update_text().never();

        let svc = CommentService::new(m.into_backend());
        let err = svc
            .edit_comment(&user("x@y.co"), post_id, Uuid::now_v7(), "yours")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn edit_sets_edited_flag() {
        let me = user("a@b.co");
        let post_id = Uuid::now_v7();
        let comment = Comment::new(post_id, me.id, None, "old".into(), Utc::now() - Duration::minutes(1));
        let cid = comment.id;
        let mut m = Mocks::new();
        m.comments.expect_get().returning(move |_, _| Ok(Some(comment.clone())));
        m.comments
            .expect_update_text()
            .withf(|_, _, t, _| t == "new")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let svc = CommentService::new(m.into_backend());
        let v = svc.edit_comment(&me, post_id, cid, " new ").await.unwrap();
        assert_eq!(v.text, "new");
        assert!(v.edited);
    }
}
