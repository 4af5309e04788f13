//! Fills the configured database with a demo account, a few posts and a
//! short discussion. Safe to re-run: the demo account is reused and posts
//! it already wrote (matched by title) are skipped.

use std::collections::HashSet;

use anyhow::{bail, Context};
use community_board::{telemetry, wiring};
use configs::{DatabaseBackend, Settings};
use domains::{AuthFailure, DomainError, Session};
use services::{AuthService, CommentService, PostDraft, PostService};
use tracing::info;

const DEMO_EMAIL: &str = "demo@board.local";
const DEMO_PASSWORD: &str = "demo-password";
const DEMO_NICKNAME: &str = "demo";

const POSTS: &[(&str, &str)] = &[
    ("Welcome to the board", "Introduce yourself in the comments."),
    ("House rules", "Be kind. Keep it on topic. No spam."),
    ("Weekend meetup?", "Anyone up for coffee on Saturday morning?"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    telemetry::init_tracing(&settings.log);
    if settings.database.backend == DatabaseBackend::Memory {
        bail!("seeding the in-memory store has no effect; set BOARD__DATABASE__BACKEND=postgres");
    }

    let backend = wiring::build_backend(&settings).await?;
    let auth = AuthService::new(backend.clone());
    let posts = PostService::new(backend.clone());
    let comments = CommentService::new(backend);

    let session = demo_session(&auth).await?;
    auth.set_nickname(&session.user, DEMO_NICKNAME).await?;

    let existing: HashSet<String> = posts
        .list_posts()
        .await?
        .into_iter()
        .filter(|p| p.post.author_id == session.user.id)
        .map(|p| p.post.title)
        .collect();

    for (title, content) in POSTS {
        if existing.contains(*title) {
            info!(title, "post already seeded");
            continue;
        }
        let draft = PostDraft { title: title.to_string(), content: content.to_string(), image: None };
        let post = posts.create_post(&session.user, draft).await?;
        info!(post_number = post.post.post_number, title, "seeded post");

        let root = comments
            .add_comment(&session.user, post.post.id, "First!")
            .await?;
        comments
            .add_reply(&session.user, post.post.id, root.id, "Replying to myself.")
            .await?;
    }

    info!(email = DEMO_EMAIL, password = DEMO_PASSWORD, "seed complete");
    Ok(())
}

async fn demo_session(auth: &AuthService) -> anyhow::Result<Session> {
    match auth.sign_up(DEMO_EMAIL, DEMO_PASSWORD).await {
        Ok(session) => Ok(session),
        Err(DomainError::Auth(AuthFailure::EmailAlreadyInUse)) => {
            info!("demo account exists; signing in");
            Ok(auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await?)
        }
        Err(err) => Err(err.into()),
    }
}
