//! End-to-end: Dispatcher driving a subscription's state from `null` to
//! `subscribed` to `null` again through a scripted fabric peer, with the
//! Store as the single source of truth for the subscription's state.

use async_trait::async_trait;
use ikd_core::model::{Source, SourceCommon, SourceKind, SubscriptionKey, SubscriptionState};
use ikd_core::MemoryStore;
use ikd_protocol::xml::Element;
use ikd_protocol::{ItemsEvent, PubSubOutcome, PubSubRequest};
use ikd_test_utils::{FabricHandle, MockFabricPeer, ScriptedResponse};
use notifier::dispatcher::{Dispatcher, EventSink};
use notifier::fabric::FabricSession;
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

struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn deliver(&self, _source: Source, _payload: Element) {}
}

fn simple_source(id: i64) -> Source {
    Source {
        common: SourceCommon { id, feed_id: 1, enabled: true, via: None, subscription_id: None },
        kind: SourceKind::Simple { service: "pubsub.example.com".to_owned(), node_identifier: "vote/1".to_owned() },
    }
}

#[tokio::test]
async fn subscription_converges_through_subscribe_and_unsubscribe() {
    let (mut peer, handle) = MockFabricPeer::new();
    peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
    peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
    let serve = tokio::spawn(async move {
        peer.serve_one().await;
        peer.serve_one().await;
        peer
    });

    let store = MemoryStore::new();
    let dispatcher =
        Dispatcher::new(Arc::new(IntegrationFabricSession(handle)), store.clone(), Arc::new(NullSink), "notifier@mediamatic.nl".to_owned());

    dispatcher.on_connected().await;
    let source = simple_source(1);
    dispatcher.add_observer(&source).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let key = SubscriptionKey::new("pubsub.example.com", "vote/1");
    let sub = store.get_subscription_by_key(&key).await.unwrap();
    assert_eq!(sub.state, SubscriptionState::Subscribed);

    dispatcher.remove_observer(&source).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let sub = store.get_subscription_by_key(&key).await.unwrap();
    assert_eq!(sub.state, SubscriptionState::Null);

    let peer = serve.await.unwrap();
    assert_eq!(
        peer.recorded,
        vec![
            PubSubRequest::Subscribe { node: "vote/1".to_owned(), subscriber: "notifier@mediamatic.nl".to_owned() },
            PubSubRequest::Unsubscribe { node: "vote/1".to_owned(), subscriber: "notifier@mediamatic.nl".to_owned() },
        ]
    );
}

#[tokio::test]
async fn reconnect_re_subscribes_every_persisted_subscription() {
    let (mut peer, handle) = MockFabricPeer::new();
    peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
    let serve = tokio::spawn(async move {
        peer.serve_one().await;
        peer
    });

    let store = MemoryStore::new();
    let key = SubscriptionKey::new("pubsub.example.com", "vote/1");
    store.power_up(&key, 1).await.unwrap();

    let dispatcher =
        Dispatcher::new(Arc::new(IntegrationFabricSession(handle)), store.clone(), Arc::new(NullSink), "notifier@mediamatic.nl".to_owned());
    dispatcher.on_connected().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let sub = store.get_subscription_by_key(&key).await.unwrap();
    assert_eq!(sub.state, SubscriptionState::Subscribed);
    serve.await.unwrap();
}
