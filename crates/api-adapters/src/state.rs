use std::sync::Arc;

use domains::MediaStorage;
use services::{AuthService, Backend, CommentService, PostService};

use crate::metrics::Metrics;

/// Shared across all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub posts: PostService,
    pub comments: CommentService,
    pub media: Arc<dyn MediaStorage>,
    pub metrics: Arc<Metrics>,
    /// Upper bound on a single multipart request body.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(backend: Backend, metrics: Arc<Metrics>, max_upload_bytes: usize) -> Self {
        Self {
            auth: AuthService::new(backend.clone()),
            posts: PostService::new(backend.clone()),
            comments: CommentService::new(backend.clone()),
            media: backend.media,
            metrics,
            max_upload_bytes,
        }
    }
}
