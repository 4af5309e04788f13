//! Builds a `Backend` from settings.
//!
//! Compiled-to-order: the Postgres store, local media and JWT sessions are
//! only available when their features are enabled. The change feed is
//! always in-process.

use std::sync::Arc;

use anyhow::{bail, Context};
use auth_adapters::{LockoutPolicy, PasswordAuthProvider, TokenIssuer};
use chrono::Duration;
use configs::{DatabaseBackend, Settings};
use domains::{CommentRepository, CredentialRepository, MediaStorage, PostRepository, UserRepository};
use services::Backend;
use storage_adapters::{BroadcastFeed, MemoryStore};
use tracing::{info, warn};

/// The four document repositories, all backed by one store.
struct Documents {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialRepository>,
}

impl Documents {
    fn from_store<S>(store: S) -> Self
    where
        S: PostRepository + CommentRepository + UserRepository + CredentialRepository + Clone + 'static,
    {
        Self {
            posts: Arc::new(store.clone()),
            comments: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            credentials: Arc::new(store),
        }
    }
}

pub async fn build_backend(settings: &Settings) -> anyhow::Result<Backend> {
    let documents = open_documents(settings).await?;
    let media = open_media(settings);
    let tokens = token_issuer(settings);

    let lockout = LockoutPolicy {
        max_failures: settings.auth.max_failed_attempts,
        window: Duration::seconds(settings.auth.lockout_window_secs),
    };
    let auth = PasswordAuthProvider::new(documents.credentials.clone(), tokens, lockout);

    Ok(Backend {
        posts: documents.posts,
        comments: documents.comments,
        users: documents.users,
        media,
        feed: Arc::new(BroadcastFeed::default()),
        auth: Arc::new(auth),
    })
}

async fn open_documents(settings: &Settings) -> anyhow::Result<Documents> {
    match settings.database.backend {
        DatabaseBackend::Memory => {
            warn!("using the in-memory store; all data is lost on exit");
            Ok(Documents::from_store(MemoryStore::new()))
        }
        DatabaseBackend::Postgres => open_postgres(settings).await,
    }
}

#[cfg(feature = "db-postgres")]
async fn open_postgres(settings: &Settings) -> anyhow::Result<Documents> {
    use secrecy::ExposeSecret;
    use storage_adapters::PgStore;

    let Some(url) = settings.database.url.as_ref() else {
        bail!("database.url is not set");
    };
    let store = PgStore::connect(url.expose_secret(), settings.database.max_connections)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    info!(max_connections = settings.database.max_connections, "postgres store ready");
    Ok(Documents::from_store(store))
}

#[cfg(not(feature = "db-postgres"))]
async fn open_postgres(_settings: &Settings) -> anyhow::Result<Documents> {
    bail!("database.backend = \"postgres\" needs the db-postgres feature")
}

#[cfg(feature = "media-local")]
fn open_media(settings: &Settings) -> Arc<dyn MediaStorage> {
    use storage_adapters::LocalMediaStore;

    info!(root = %settings.media.root.display(), "local media storage");
    Arc::new(LocalMediaStore::new(
        settings.media.root.clone(),
        settings.media.url_prefix.clone(),
        settings.media.max_upload_bytes,
    ))
}

#[cfg(not(feature = "media-local"))]
fn open_media(settings: &Settings) -> Arc<dyn MediaStorage> {
    use storage_adapters::MemoryMedia;

    warn!("media-local is disabled; uploads are kept in memory");
    Arc::new(MemoryMedia::new(settings.media.url_prefix.clone()))
}

#[cfg(feature = "auth-jwt")]
fn token_issuer(settings: &Settings) -> Arc<dyn TokenIssuer> {
    use auth_adapters::JwtTokens;
    use secrecy::ExposeSecret;

    if settings.auth.uses_dev_secret() {
        warn!("auth.jwt_secret is the development default; set BOARD__AUTH__JWT_SECRET");
    }
    Arc::new(JwtTokens::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        Duration::seconds(settings.auth.token_ttl_secs),
    ))
}

#[cfg(not(feature = "auth-jwt"))]
fn token_issuer(settings: &Settings) -> Arc<dyn TokenIssuer> {
    use auth_adapters::OpaqueTokens;

    Arc::new(OpaqueTokens::new(Duration::seconds(settings.auth.token_ttl_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    #[tokio::test]
    async fn memory_backend_wires_every_port() {
        let settings = Settings::load_from(Path::new("no-such-dir"), "test", Some(HashMap::new())).unwrap();
        let backend = build_backend(&settings).await.unwrap();
        assert!(backend.posts.list_newest_first().await.unwrap().is_empty());
        assert!(backend.media.url("a.png").starts_with("/media/"));
    }
}
