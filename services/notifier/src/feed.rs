//! Feed-level notification routing.
//!
//! [`FeedRouter`] is where the Dispatcher's and Microblog Dispatcher's
//! fanned-out deliveries converge: it formats a raw payload via the
//! formatter library, looks up which [`Aggregator`] the owning feed is
//! wired to via `aggregator_ref`, and forwards. `LivePageAggregator`
//! instances are kept per feed id so the live-page WebSocket handler can
//! attach to the same ring buffer the router is filling.

use crate::aggregator::{Aggregator, LivePageAggregator, LoggingAggregator, PubSubAggregator};
use crate::dispatcher::{EventSink, Publisher};
use async_trait::async_trait;
use ikd_core::model::{AggregatorRef, Feed, Source};
use ikd_core::Store;
use ikd_protocol::xml::Element;
use ikd_protocol::Notification;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct FeedRouter<S: Store, P: Publisher> {
    store: Arc<S>,
    publisher: Arc<P>,
    logging: Arc<LoggingAggregator>,
    live_pages: Mutex<HashMap<i64, Arc<LivePageAggregator>>>,
    live_page_history: usize,
}

impl<S: Store, P: Publisher> FeedRouter<S, P> {
    pub fn new(store: Arc<S>, publisher: Arc<P>, live_page_history: usize) -> Arc<Self> {
        Arc::new(FeedRouter {
            store,
            publisher,
            logging: Arc::new(LoggingAggregator),
            live_pages: Mutex::new(HashMap::new()),
            live_page_history,
        })
    }

    /// The live-page aggregator backing `feed_id`, if that feed is
    /// wired to one — for the WebSocket handler to attach a new client.
    pub async fn live_page(&self, feed_id: i64) -> Option<Arc<LivePageAggregator>> {
        let feed = self.store.get_feed(feed_id).await.ok()?;
        if matches!(feed.aggregator_ref, AggregatorRef::LivePage) {
            Some(self.live_page_for(feed_id).await)
        } else {
            None
        }
    }

    async fn live_page_for(&self, feed_id: i64) -> Arc<LivePageAggregator> {
        let mut live_pages = self.live_pages.lock().await;
        live_pages.entry(feed_id).or_insert_with(|| Arc::new(LivePageAggregator::new(self.live_page_history))).clone()
    }

    async fn route(&self, feed: &Feed, notification: Notification) {
        if !notification.is_displayable() {
            return;
        }
        match &feed.aggregator_ref {
            AggregatorRef::Logging => self.logging.process_notifications(feed, &[notification]).await,
            AggregatorRef::PubSub { .. } => {
                PubSubAggregator::new(self.publisher.clone()).process_notifications(feed, &[notification]).await
            }
            AggregatorRef::LivePage => {
                self.live_page_for(feed.id).await.process_notifications(feed, &[notification]).await;
            }
        }
    }

    /// Entry point for the Microblog Dispatcher: a Twitter source has
    /// already produced a formatted notification, route it directly.
    pub async fn deliver_notification(&self, source: &Source, notification: Notification) {
        let Ok(feed) = self.store.get_feed(source.common.feed_id).await else { return };
        self.route(&feed, notification).await;
    }
}

#[async_trait]
impl<S: Store + 'static, P: Publisher + 'static> EventSink for FeedRouter<S, P> {
    async fn deliver(&self, source: Source, payload: Element) {
        let Ok(feed) = self.store.get_feed(source.common.feed_id).await else { return };
        let Some(notification) = ikd_core::formatter::format(&source, feed.language, &payload) else { return };
        self.route(&feed, notification).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikd_core::model::{Language, SourceCommon, SourceKind, Thing};
    use ikd_core::MemoryStore;
    use ikd_protocol::PubSubOutcome;

    struct StubPublisher;

    #[async_trait]
    impl Publisher for StubPublisher {
        async fn publish(&self, _node: &str, _items: Vec<Element>) -> PubSubOutcome {
            PubSubOutcome::Ok
        }
    }

    async fn feed_with(store: &Arc<MemoryStore>, aggregator_ref: AggregatorRef) -> Feed {
        store
            .put_feed(Feed { id: 0, handle: "funfair".to_owned(), title: "Funfair".to_owned(), language: Language::En, aggregator_ref })
            .await
            .unwrap()
    }

    fn vote_source(feed_id: i64) -> Source {
        Source {
            common: SourceCommon { id: 0, feed_id, enabled: true, via: None, subscription_id: None },
            kind: SourceKind::Vote { question: Thing::new("Q", "http://things.mediamatic.nl/id/1"), template: None },
        }
    }

    #[tokio::test]
    async fn live_page_returns_none_for_non_live_page_feed() {
        let store = MemoryStore::new();
        let feed = feed_with(&store, AggregatorRef::Logging).await;
        let router = FeedRouter::new(store, Arc::new(StubPublisher), 13);
        assert!(router.live_page(feed.id).await.is_none());
    }

    #[tokio::test]
    async fn deliver_formats_and_routes_to_live_page() {
        let store = MemoryStore::new();
        let feed = feed_with(&store, AggregatorRef::LivePage).await;
        let source = store.put_source(vote_source(feed.id)).await.unwrap();
        let router = FeedRouter::new(store, Arc::new(StubPublisher), 13);

        let payload = Element::parse(
            r#"<rsp>
                <vote><answer_id_ref>a1</answer_id_ref></vote>
                <person><title>Fred Pook</title></person>
                <question><answers><item><answer_id>a1</answer_id><title>Shadow Search Platform</title></item></answers></question>
            </rsp>"#,
        )
        .unwrap();

        router.deliver(source, payload).await;

        let live_page = router.live_page(feed.id).await.unwrap();
        let history = live_page.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].get("title"), Some("Fred Pook"));
    }
}
