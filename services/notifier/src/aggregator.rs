//! Fan-out notification sinks.
//!
//! Each [`Aggregator`] is attached to a feed (via its `aggregator_ref`)
//! and receives every notification the feed's sources produce.

use crate::dispatcher::Publisher;
use async_trait::async_trait;
use ikd_core::model::Feed;
use ikd_protocol::Notification;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn process_notifications(&self, feed: &Feed, notifications: &[Notification]);
}

/// Logs each notification; the simplest sink, useful for feeds with no
/// external consumer configured.
pub struct LoggingAggregator;

#[async_trait]
impl Aggregator for LoggingAggregator {
    async fn process_notifications(&self, feed: &Feed, notifications: &[Notification]) {
        for n in notifications {
            info!(
                feed = %feed.handle,
                title = n.get("title").unwrap_or_default(),
                subtitle = n.get("subtitle").unwrap_or_default(),
                "notification"
            );
        }
    }
}

/// Republishes onto the feed's own pub/sub node, via the Dispatcher's
/// publish-with-create-node-retry.
pub struct PubSubAggregator<P: Publisher> {
    publisher: Arc<P>,
}

impl<P: Publisher> PubSubAggregator<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        PubSubAggregator { publisher }
    }
}

#[async_trait]
impl<P: Publisher> Aggregator for PubSubAggregator<P> {
    async fn process_notifications(&self, feed: &Feed, notifications: &[Notification]) {
        let items = notifications.iter().map(Notification::to_element).collect();
        let outcome = self.publisher.publish(&feed.handle, items).await;
        if !matches!(outcome, ikd_protocol::PubSubOutcome::Ok) {
            tracing::warn!(feed = %feed.handle, ?outcome, "pubsub aggregator: publish failed");
        }
    }
}

/// Keeps a bounded ring buffer of the last `max_history` notifications
/// and broadcasts each new one to attached live-page WebSocket clients.
pub struct LivePageAggregator {
    max_history: usize,
    history: Mutex<VecDeque<Notification>>,
    tx: broadcast::Sender<Notification>,
}

impl LivePageAggregator {
    pub fn new(max_history: usize) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        LivePageAggregator { max_history, history: Mutex::new(VecDeque::new()), tx }
    }

    /// The ring buffer's current contents, oldest first, for replay to a
    /// freshly connected live-page client.
    pub async fn history(&self) -> Vec<Notification> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// A fresh receiver for notifications arriving after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Aggregator for LivePageAggregator {
    async fn process_notifications(&self, _feed: &Feed, notifications: &[Notification]) {
        let mut history = self.history.lock().await;
        for n in notifications {
            history.push_back(n.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
            let _ = self.tx.send(n.clone());
        }
    }
}
