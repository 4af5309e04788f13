//! In-process change feed on top of `tokio::sync::broadcast`.

use async_trait::async_trait;
use domains::{ChangeEvent, ChangeFeed, Subscription};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 256;

/// Fans every published event out to all live subscribers.
///
/// A subscriber that falls more than `capacity` events behind receives a
/// single `ChangeEvent::Resync` instead of the events it missed.
pub struct BroadcastFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed for BroadcastFeed {
    fn publish(&self, event: ChangeEvent) {
        // No subscribers is not an error.
        if self.tx.send(event).is_err() {
            debug!(?event, "change published with no subscribers");
        }
    }

    fn subscribe(&self) -> Box<dyn Subscription> {
        Box::new(BroadcastSubscription { rx: self.tx.subscribe() })
    }
}

struct BroadcastSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

#[async_trait]
impl Subscription for BroadcastSubscription {
    async fn recv(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "change subscriber lagged, forcing resync");
                Some(ChangeEvent::Resync)
            }
            Err(RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let feed = BroadcastFeed::default();
        let mut sub = feed.subscribe();
        let id = Uuid::now_v7();

        feed.publish(ChangeEvent::PostsChanged);
        feed.publish(ChangeEvent::CommentsChanged(id));

        assert_eq!(sub.recv().await, Some(ChangeEvent::PostsChanged));
        assert_eq!(sub.recv().await, Some(ChangeEvent::CommentsChanged(id)));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let feed = BroadcastFeed::new(2);
        let mut sub = feed.subscribe();
        for _ in 0..5 {
            feed.publish(ChangeEvent::PostsChanged);
        }
        assert_eq!(sub.recv().await, Some(ChangeEvent::Resync));
        // The two retained events are still delivered afterwards.
        assert_eq!(sub.recv().await, Some(ChangeEvent::PostsChanged));
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let feed = BroadcastFeed::default();
        let sub = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(ChangeEvent::PostsChanged);
    }
}
