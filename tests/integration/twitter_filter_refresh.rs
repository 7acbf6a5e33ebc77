//! End-to-end: the Microblog Dispatcher pushes the union of enabled
//! Twitter sources' filters to the Monitor, reconnecting only when that
//! union actually changes.

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use ikd_core::image::{ImageResolver, ResolverKind};
use ikd_core::model::{AggregatorRef, Feed, Language, Source, SourceCommon, SourceKind};
use ikd_core::MemoryStore;
use ikd_protocol::xml::Element;
use ikd_protocol::PubSubOutcome;
use notifier::feed::FeedRouter;
use notifier::twitter::{MicroblogDispatcher, Monitor, TwitterCredentials};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StubPublisher;

#[async_trait]
impl notifier::dispatcher::Publisher for StubPublisher {
    async fn publish(&self, _node: &str, _items: Vec<Element>) -> PubSubOutcome {
        PubSubOutcome::Ok
    }
}

struct NoopResolver;

#[async_trait]
impl ImageResolver for NoopResolver {
    async fn resolve(&self, _url: &str, _kind: ResolverKind) -> Option<String> {
        None
    }
}

/// A streaming endpoint that counts connections and closes each one
/// immediately, so a test can observe reconnect attempts without caring
/// about stream content.
async fn start_counting_server() -> (String, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route(
        "/stream",
        get(|State(connects): State<Arc<AtomicUsize>>| async move {
            connects.fetch_add(1, Ordering::SeqCst);
            ([("content-type", "application/json")], "")
        }),
    );
    let router = router.with_state(connects.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.ok() });
    (format!("http://{addr}/stream"), connects)
}

fn twitter_source(feed_id: i64, terms: &[&str], enabled: bool) -> Source {
    Source {
        common: SourceCommon { id: 0, feed_id, enabled, via: None, subscription_id: None },
        kind: SourceKind::Twitter { terms: terms.iter().map(|s| s.to_string()).collect(), user_ids: vec![] },
    }
}

#[tokio::test]
async fn reconnects_only_when_the_filter_union_changes() {
    let (stream_url, connects) = start_counting_server().await;

    let store = MemoryStore::new();
    let feed = store
        .put_feed(Feed { id: 0, handle: "tweets".to_owned(), title: "Tweets".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::Logging })
        .await
        .unwrap();

    let router = FeedRouter::new(store.clone(), Arc::new(StubPublisher), 13);
    let monitor = Monitor::new(
        stream_url,
        TwitterCredentials { consumer_key: "k".to_owned(), consumer_secret: "s".to_owned(), access_token: "t".to_owned(), access_token_secret: "ts".to_owned() },
    );
    let dispatcher = MicroblogDispatcher::new(store.clone(), router, monitor.clone(), Arc::new(NoopResolver));
    tokio::spawn(monitor.clone().run());

    let a = store.put_source(twitter_source(feed.id, &["rust"], true)).await.unwrap();
    dispatcher.set_filters().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // A duplicate term under a second source doesn't move the union.
    store.put_source(twitter_source(feed.id, &["rust"], true)).await.unwrap();
    dispatcher.refresh_filters().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // Disabling the original source while the duplicate covers the same
    // term still leaves the union unchanged.
    let mut disabled = a.clone();
    disabled.common.enabled = false;
    store.put_source(disabled).await.unwrap();
    dispatcher.refresh_filters().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    // A genuinely new term forces a reconnect.
    store.put_source(twitter_source(feed.id, &["async"], true)).await.unwrap();
    dispatcher.refresh_filters().await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    monitor.stop();
}
