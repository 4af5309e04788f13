//! # api-adapters
//!
//! The HTTP surface of the community board (feature `web-axum`): JSON
//! routes for every view-model operation, Server-Sent Events for live
//! queries, media serving, health and Prometheus metrics.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod sse;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "web-axum")]
pub use state::AppState;

#[cfg(feature = "web-axum")]
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

/// Multipart overhead allowed on top of the image itself.
#[cfg(feature = "web-axum")]
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the full application router.
///
/// `cors_origins` lists the browser origins allowed to call the API; empty
/// means same-origin only.
#[cfg(feature = "web-axum")]
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    use handlers::{auth, comments, media, posts, system};

    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes + FORM_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/me/nickname", put(auth::set_nickname))
        .route("/posts", get(posts::list).post(posts::create))
        .route("/posts/live", get(posts::watch_list))
        .route(
            "/posts/{id}",
            get(posts::get).put(posts::update).delete(posts::delete),
        )
        .route("/posts/{id}/live", get(posts::watch))
        .route("/posts/{id}/views", post(posts::increment_views))
        .route(
            "/posts/{id}/comments",
            get(comments::list).post(comments::create),
        )
        .route("/posts/{id}/comments/live", get(comments::watch))
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(comments::update).delete(comments::delete),
        )
        .layer(body_limit);

    let mut app = Router::new()
        .nest("/api", api)
        .route("/media/{*key}", get(media::serve))
        .route("/metrics", get(system::metrics))
        .route("/healthz", get(system::healthz))
        .layer(middleware::nosniff())
        .layer(middleware::trace_layer());

    if let Some(cors) = middleware::cors_policy(cors_origins) {
        app = app.layer(cors);
    }
    app.with_state(state)
}
