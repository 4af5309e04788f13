//! Live queries: a snapshot that refreshes itself whenever the backend
//! reports a relevant change.

use async_trait::async_trait;
use domains::{ChangeEvent, ChangeFeed, Result, Subscription};

/// A re-runnable read plus the filter deciding which events invalidate it.
#[async_trait]
pub trait Snapshot: Send + Sync {
    type Output: Send;

    async fn load(&self) -> Result<Self::Output>;
    fn is_relevant(&self, event: &ChangeEvent) -> bool;
}

/// Subscription-scoped view of a query.
///
/// The first `next()` yields the current snapshot; every later call waits
/// for a relevant change and yields a fresh one. Dropping the `LiveQuery`
/// drops its subscription.
pub struct LiveQuery<Q: Snapshot> {
    query: Q,
    subscription: Box<dyn Subscription>,
    primed: bool,
}

impl<Q: Snapshot> LiveQuery<Q> {
    /// Subscribes before the first read so no change between the two is lost.
    pub fn new(feed: &dyn ChangeFeed, query: Q) -> Self {
        Self { subscription: feed.subscribe(), query, primed: false }
    }

    /// `None` once the change feed has shut down.
    pub async fn next(&mut self) -> Option<Result<Q::Output>> {
        if !self.primed {
            self.primed = true;
            return Some(self.query.load().await);
        }
        loop {
            let event = self.subscription.recv().await?;
            if self.query.is_relevant(&event) {
                tracing::trace!(?event, "live query refresh");
                return Some(self.query.load().await);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockChangeFeed;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Scripted(VecDeque<ChangeEvent>);

    #[async_trait]
    impl Subscription for Scripted {
        async fn recv(&mut self) -> Option<ChangeEvent> {
            self.0.pop_front()
        }
    }

    struct Counting {
        loads: Arc<AtomicUsize>,
        watched: Uuid,
    }

    #[async_trait]
    impl Snapshot for Counting {
        type Output = usize;

        async fn load(&self) -> Result<usize> {
            Ok(self.loads.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn is_relevant(&self, event: &ChangeEvent) -> bool {
            event.affects_post(self.watched)
        }
    }

    #[tokio::test]
    async fn yields_snapshot_then_refreshes_on_relevant_events_only() {
        let watched = Uuid::now_v7();
        let other = Uuid::now_v7();
        let script = VecDeque::from(vec![
            ChangeEvent::PostChanged(other),
            ChangeEvent::CommentsChanged(watched),
            ChangeEvent::PostChanged(watched),
        ]);

        let mut feed = MockChangeFeed::new();
        let mut script = Some(script);
        feed.expect_subscribe()
            .times(1)
            .returning(move || Box::new(Scripted(script.take().unwrap_or_default())));

        let loads = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::new(&feed, Counting { loads: loads.clone(), watched });

        assert_eq!(live.next().await.unwrap().unwrap(), 1);
        assert_eq!(live.next().await.unwrap().unwrap(), 2);
        // Script exhausted: the feed is closed.
        assert!(live.next().await.is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn closed_feed_still_yields_initial_snapshot() {
        let mut feed = MockChangeFeed::new();
        feed.expect_subscribe()
            .returning(|| Box::new(Scripted(VecDeque::new())));

        let loads = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::new(&feed, Counting { loads, watched: Uuid::now_v7() });

        tokio_test::block_on(async {
            assert_eq!(tokio_test::assert_ok!(live.next().await.unwrap()), 1);
            assert!(live.next().await.is_none());
        });
    }
}
