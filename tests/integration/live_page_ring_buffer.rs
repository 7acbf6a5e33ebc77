//! End-to-end: a real WebSocket client attaching to `/live/:feed_id`
//! sees the bounded history replayed on connect, capped at the feed's
//! configured ring-buffer size, and then sees later notifications pushed
//! live as they're delivered.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ikd_core::model::{AggregatorRef, Feed, Language, Source, SourceCommon, SourceKind};
use ikd_core::MemoryStore;
use ikd_protocol::xml::Element;
use ikd_protocol::{Notification, PubSubOutcome};
use notifier::feed::FeedRouter;
use notifier::live_page;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

struct StubPublisher;

#[async_trait]
impl notifier::dispatcher::Publisher for StubPublisher {
    async fn publish(&self, _node: &str, _items: Vec<Element>) -> PubSubOutcome {
        PubSubOutcome::Ok
    }
}

fn dummy_source(feed_id: i64) -> Source {
    Source {
        common: SourceCommon { id: 0, feed_id, enabled: true, via: None, subscription_id: None },
        kind: SourceKind::Simple { service: "pubsub.example.com".to_owned(), node_identifier: "n".to_owned() },
    }
}

fn item(title: &str) -> Notification {
    let mut n = Notification::new();
    n.set("title", title);
    n
}

#[tokio::test]
async fn history_replay_is_capped_and_later_notifications_push_live() {
    const MAX_HISTORY: usize = 3;

    let store = MemoryStore::new();
    let feed = store
        .put_feed(Feed { id: 0, handle: "funfair".to_owned(), title: "Funfair".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::LivePage })
        .await
        .unwrap();
    let source = dummy_source(feed.id);

    let router = FeedRouter::new(store.clone(), Arc::new(StubPublisher), MAX_HISTORY);

    for i in 1..=5 {
        router.deliver_notification(&source, item(&format!("item {i}"))).await;
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = live_page::router(router.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.ok() });

    let url = format!("ws://{addr}/live/{}", feed.id);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let mut replayed = Vec::new();
    for _ in 0..MAX_HISTORY {
        let msg = tokio::time::timeout(Duration::from_millis(500), ws.next()).await.unwrap().unwrap().unwrap();
        let Message::Text(text) = msg else { panic!("expected a text frame, got {msg:?}") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        replayed.push(value["title"].as_str().unwrap().to_owned());
    }
    assert_eq!(replayed, vec!["item 3", "item 4", "item 5"]);

    router.deliver_notification(&source, item("item 6")).await;
    let msg = tokio::time::timeout(Duration::from_millis(500), ws.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = msg else { panic!("expected a text frame, got {msg:?}") };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["title"].as_str(), Some("item 6"));

    ws.close(None).await.ok();
}

#[tokio::test]
async fn non_live_page_feed_closes_the_socket_immediately() {
    let store = MemoryStore::new();
    let feed = store
        .put_feed(Feed { id: 0, handle: "log-only".to_owned(), title: "Log only".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::Logging })
        .await
        .unwrap();

    let router = FeedRouter::new(store.clone(), Arc::new(StubPublisher), 13);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = live_page::router(router);
    tokio::spawn(async move { axum::serve(listener, app).await.ok() });

    let url = format!("ws://{addr}/live/{}", feed.id);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let next = tokio::time::timeout(Duration::from_millis(500), ws.next()).await.unwrap();
    assert!(next.is_none() || matches!(next, Some(Ok(Message::Close(_)))));
}
