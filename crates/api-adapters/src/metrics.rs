//! Prometheus counters for the board's user-visible operations.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SignInLabels {
    pub outcome: String,
}

/// Counters are cheap handles; clones share the underlying value.
pub struct Metrics {
    registry: Registry,
    pub posts_created: Counter,
    pub comments_created: Counter,
    pub views_incremented: Counter,
    pub sign_ins: Family<SignInLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("board");
        let posts_created = Counter::default();
        let comments_created = Counter::default();
        let views_incremented = Counter::default();
        let sign_ins = Family::<SignInLabels, Counter>::default();

        registry.register("posts_created", "Posts created", posts_created.clone());
        registry.register(
            "comments_created",
            "Comments and replies created",
            comments_created.clone(),
        );
        registry.register(
            "views_incremented",
            "Post view increments",
            views_incremented.clone(),
        );
        registry.register("sign_ins", "Sign-in attempts by outcome", sign_ins.clone());

        Self { registry, posts_created, comments_created, views_incremented, sign_ins }
    }

    pub fn record_sign_in(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.sign_ins
            .get_or_create(&SignInLabels { outcome: outcome.to_string() })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
