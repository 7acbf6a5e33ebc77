//! End-to-end: an inbound pub/sub items event reaches the Dispatcher,
//! gets matched to its subscription's observers, formatted by
//! `ikd-core`'s formatter library, and lands in the feed's live-page
//! ring buffer.

use async_trait::async_trait;
use ikd_core::model::{AggregatorRef, Feed, Language, SourceCommon, SourceKind, Thing};
use ikd_core::MemoryStore;
use ikd_protocol::xml::Element;
use ikd_protocol::{ItemsEvent, PubSubOutcome, PubSubRequest};
use ikd_test_utils::{FabricHandle, MockFabricPeer, ScriptedResponse};
use notifier::dispatcher::Dispatcher;
use notifier::fabric::FabricSession;
use notifier::feed::FeedRouter;
use std::sync::Arc;
use std::time::Duration;

struct IntegrationFabricSession(FabricHandle);

#[async_trait]
impl FabricSession for IntegrationFabricSession {
    async fn subscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome {
        self.0.send(PubSubRequest::Subscribe { node: node.to_owned(), subscriber: subscriber.to_owned() }).await
    }
    async fn unsubscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome {
        self.0.send(PubSubRequest::Unsubscribe { node: node.to_owned(), subscriber: subscriber.to_owned() }).await
    }
    async fn create_node(&self, node: &str) -> PubSubOutcome {
        self.0.send(PubSubRequest::CreateNode { node: node.to_owned() }).await
    }
    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome {
        self.0.send(PubSubRequest::Publish { node: node.to_owned(), items }).await
    }
    async fn items_query(&self, node: &str, max_items: u32) -> PubSubOutcome {
        self.0.send(PubSubRequest::ItemsQuery { node: node.to_owned(), max_items }).await
    }
    async fn ping(&self) -> PubSubOutcome {
        self.0.send(PubSubRequest::Ping).await
    }
    async fn next_event(&self) -> Option<ItemsEvent> {
        self.0.next_event().await
    }
}

struct StubPublisher;

#[async_trait]
impl notifier::dispatcher::Publisher for StubPublisher {
    async fn publish(&self, _node: &str, _items: Vec<Element>) -> PubSubOutcome {
        PubSubOutcome::Ok
    }
}

#[tokio::test]
async fn inbound_vote_event_reaches_the_live_page() {
    let (mut peer, handle) = MockFabricPeer::new();
    peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
    let serve = tokio::spawn(async move {
        peer.serve_one().await;
        peer
    });

    let store = MemoryStore::new();
    let feed = store
        .put_feed(Feed { id: 0, handle: "funfair".to_owned(), title: "Funfair".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::LivePage })
        .await
        .unwrap();
    let source = store
        .put_source(ikd_core::model::Source {
            common: SourceCommon { id: 0, feed_id: feed.id, enabled: true, via: None, subscription_id: None },
            kind: SourceKind::Vote { question: Thing::new("Q", "http://things.mediamatic.nl/id/1"), template: None },
        })
        .await
        .unwrap();

    let router = FeedRouter::new(store.clone(), Arc::new(StubPublisher), 13);
    let dispatcher =
        Dispatcher::new(Arc::new(IntegrationFabricSession(handle)), store.clone(), router.clone(), "notifier@mediamatic.nl".to_owned());

    dispatcher.on_connected().await;
    dispatcher.add_observer(&source).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let peer = serve.await.unwrap();
    assert_eq!(peer.recorded, vec![PubSubRequest::Subscribe { node: "vote/1".to_owned(), subscriber: "notifier@mediamatic.nl".to_owned() }]);

    let payload = Element::parse(
        r#"<rsp>
            <vote><answer_id_ref>a1</answer_id_ref></vote>
            <person><title>Fred Pook</title></person>
            <question><answers><item><answer_id>a1</answer_id><title>Shadow Search Platform</title></item></answers></question>
        </rsp>"#,
    )
    .unwrap();
    dispatcher
        .on_items_event(ItemsEvent {
            sender_service: "pubsub.things.mediamatic.nl".to_owned(),
            recipient: "notifier@mediamatic.nl".to_owned(),
            node: "vote/1".to_owned(),
            items: vec![payload],
        })
        .await;

    let live_page = router.live_page(feed.id).await.unwrap();
    let history = live_page.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].get("title"), Some("Fred Pook"));
}
