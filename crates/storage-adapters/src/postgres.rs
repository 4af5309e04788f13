//! # PostgreSQL document store
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Queries are checked at runtime so the crate builds without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    next_post_number, Comment, CommentId, CommentRepository, Credential, CredentialRepository,
    DomainError, NewPost, Post, PostId, PostRepository, PostUpdate, Result, UserId,
    UserProfile, UserRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::ALREADY_DELETED;

const POST_COUNTER: &str = "posts";

const POST_COLUMNS: &str = "id, post_number, title, content, image_key, author_id, \
                            created_at, updated_at, views, comment_count";
const COMMENT_COLUMNS: &str =
    "id, post_id, text, author_id, parent_id, created_at, updated_at, is_deleted";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(DomainError::internal)?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Unique violations become `Conflict`; everything else is internal.
fn db_err(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DomainError::Conflict(db.message().to_string());
        }
    }
    DomainError::internal(err)
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn row_to_post(row: &PgRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id").map_err(db_err)?,
        post_number: to_count(row.try_get("post_number").map_err(db_err)?),
        title: row.try_get("title").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        image_key: row.try_get("image_key").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        nickname: None,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        views: to_count(row.try_get("views").map_err(db_err)?),
        comment_count: to_count(row.try_get("comment_count").map_err(db_err)?),
    })
}

fn row_to_comment(row: &PgRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id").map_err(db_err)?,
        post_id: row.try_get("post_id").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        parent_id: row.try_get("parent_id").map_err(db_err)?,
        nickname: None,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        is_deleted: row.try_get("is_deleted").map_err(db_err)?,
    })
}

fn row_to_profile(row: &PgRow) -> Result<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id").map_err(db_err)?,
        email: row.try_get("email").map_err(db_err)?,
        nickname: row.try_get("nickname").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn ensure_affected(rows: u64, entity: &'static str, id: Uuid) -> Result<()> {
    if rows == 0 {
        return Err(DomainError::not_found(entity, id));
    }
    Ok(())
}

#[async_trait]
impl PostRepository for PgStore {
    /// Reads and bumps the counter row under `FOR UPDATE`, then inserts the
    /// post, all in one transaction.
    async fn insert_numbered(&self, draft: NewPost) -> Result<Post> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("INSERT INTO counters (name, value) VALUES ($1, 0) ON CONFLICT (name) DO NOTHING")
            .bind(POST_COUNTER)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT value FROM counters WHERE name = $1 FOR UPDATE")
                .bind(POST_COUNTER)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let number = next_post_number(current.map(to_count));
        let number_db = i64::try_from(number).map_err(DomainError::internal)?;

        sqlx::query("UPDATE counters SET value = $2 WHERE name = $1")
            .bind(POST_COUNTER)
            .bind(number_db)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let post = Post::from_draft(Uuid::now_v7(), number, draft, Utc::now());
        sqlx::query(
            "INSERT INTO posts (id, post_number, title, content, image_key, author_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(post.id)
        .bind(number_db)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_key)
        .bind(post.author_id)
        .bind(post.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn list_newest_first(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, post_number DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_post).collect()
    }

    async fn update(&self, id: PostId, update: PostUpdate) -> Result<Post> {
        let row = sqlx::query(&format!(
            "UPDATE posts SET title = $2, content = $3, image_key = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.content)
        .bind(update.image_key)
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(row) => row_to_post(&row),
            None => Err(DomainError::not_found("Post", id)),
        }
    }

    async fn increment_views(&self, id: PostId) -> Result<()> {
        let done = sqlx::query("UPDATE posts SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        ensure_affected(done.rows_affected(), "Post", id)
    }

    async fn adjust_comment_count(&self, id: PostId, delta: i64) -> Result<()> {
        let done = sqlx::query(
            "UPDATE posts SET comment_count = GREATEST(comment_count + $2, 0) WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        ensure_affected(done.rows_affected(), "Post", id)
    }

    /// Comments go with the post through `ON DELETE CASCADE`.
    async fn delete_with_comments(&self, id: PostId) -> Result<()> {
        let done = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        ensure_affected(done.rows_affected(), "Post", id)
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert(&self, comment: Comment) -> Result<()> {
        let post_id = comment.post_id;
        sqlx::query(
            "INSERT INTO comments (id, post_id, text, author_id, parent_id, created_at, updated_at, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.text)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .bind(comment.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::not_found("Post", post_id)
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn get(&self, post_id: PostId, id: CommentId) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 AND id = $2"
        ))
        .bind(post_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_comment).transpose()
    }

    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_comment).collect()
    }

    async fn update_text(
        &self,
        post_id: PostId,
        id: CommentId,
        text: String,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let done = sqlx::query(
            "UPDATE comments SET text = $3, updated_at = $4 WHERE post_id = $1 AND id = $2",
        )
        .bind(post_id)
        .bind(id)
        .bind(text)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        ensure_affected(done.rows_affected(), "Comment", id)
    }

    async fn mark_deleted(&self, post_id: PostId, id: CommentId, at: DateTime<Utc>) -> Result<()> {
        let done = sqlx::query(
            "UPDATE comments SET is_deleted = TRUE, updated_at = $3 \
             WHERE post_id = $1 AND id = $2 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if done.rows_affected() > 0 {
            return Ok(());
        }
        match CommentRepository::get(self, post_id, id).await? {
            Some(_) => Err(DomainError::Conflict(ALREADY_DELETED.into())),
            None => Err(DomainError::not_found("Comment", id)),
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get(&self, id: UserId) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, email, nickname, created_at, updated_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_profile).transpose()
    }

    async fn get_many(&self, ids: Vec<UserId>) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query(
            "SELECT id, email, nickname, created_at, updated_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_profile).collect()
    }

    async fn upsert(&self, profile: UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, nickname, created_at, updated_at) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, nickname = EXCLUDED.nickname, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(profile.id)
        .bind(profile.email)
        .bind(profile.nickname)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for PgStore {
    async fn insert(&self, credential: Credential) -> Result<()> {
        sqlx::query(
            "INSERT INTO credentials (user_id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(credential.user_id)
        .bind(credential.email)
        .bind(credential.password_hash)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let row = sqlx::query(
            "SELECT user_id, email, password_hash, created_at FROM credentials WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| -> Result<Credential> {
            Ok(Credential {
                user_id: row.try_get("user_id").map_err(db_err)?,
                email: row.try_get("email").map_err(db_err)?,
                password_hash: row.try_get("password_hash").map_err(db_err)?,
                created_at: row.try_get("created_at").map_err(db_err)?,
            })
        })
        .transpose()
    }
}
