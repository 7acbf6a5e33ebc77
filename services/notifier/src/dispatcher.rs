//! The goal-driven pub/sub subscription state machine.
//!
//! One [`Dispatcher`] multiplexes every `(service, node)` subscription the
//! store's sources want. Each key's desired state ("goal") is implied by
//! its observer count (`Subscription::goal`); `reconcile` drives the peer
//! toward that goal under back-off, serialized per key by the `pending`
//! set so a re-added observer during an in-flight unsubscribe waits for it
//! to finish before resubscribing.

use crate::fabric::FabricSession;
use crate::http::admin::ResubscribeHook;
use async_trait::async_trait;
use ikd_core::model::{Source, SubscriptionKey, SubscriptionState};
use ikd_core::Store;
use ikd_protocol::pubsub::StanzaError;
use ikd_protocol::xml::Element;
use ikd_protocol::{ItemsEvent, PubSubOutcome, StanzaCondition};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DELAY_INITIAL: Duration = Duration::from_millis(250);
const DELAY_MAX: Duration = Duration::from_secs(16);
const DELAY_FACTOR: u32 = 2;

/// Where routed items events end up once the Dispatcher has matched them
/// to a subscription's observers.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, source: Source, payload: Element);
}

enum Action {
    Subscribe,
    Unsubscribe,
}

/// What `PubSubAggregator` needs from the Dispatcher: a single publish
/// call with the create-node-and-retry-once recovery already applied.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome;
}

#[async_trait]
impl<F: FabricSession + 'static, S: Store + 'static, E: EventSink + 'static> Publisher for Dispatcher<F, S, E> {
    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome {
        self.publish_notifications(node, items).await
    }
}

/// Implemented on the `Arc` handle, not `Dispatcher` itself, since
/// `add_observer`/`remove_observer` need to clone their own strong
/// reference to spawn `reconcile`.
#[async_trait]
impl<F: FabricSession + 'static, S: Store + 'static, E: EventSink + 'static> ResubscribeHook for Arc<Dispatcher<F, S, E>> {
    async fn on_source_added(&self, source: &Source) {
        self.add_observer(source).await;
    }
    async fn on_source_removed(&self, source: &Source) {
        self.remove_observer(source).await;
    }
}

pub struct Dispatcher<F: FabricSession, S: Store, E: EventSink> {
    fabric: Arc<F>,
    store: Arc<S>,
    sink: Arc<E>,
    /// Our own bare+resource address, matched against inbound event
    /// recipients and sent as the subscriber JID on (un)subscribe.
    own_address: String,
    connected: AtomicBool,
    pending: Mutex<std::collections::HashSet<SubscriptionKey>>,
    backoff: Mutex<HashMap<SubscriptionKey, Duration>>,
}

impl<F: FabricSession + 'static, S: Store + 'static, E: EventSink + 'static> Dispatcher<F, S, E> {
    pub fn new(fabric: Arc<F>, store: Arc<S>, sink: Arc<E>, own_address: String) -> Arc<Self> {
        Arc::new(Dispatcher {
            fabric,
            store,
            sink,
            own_address,
            connected: AtomicBool::new(false),
            pending: Mutex::new(std::collections::HashSet::new()),
            backoff: Mutex::new(HashMap::new()),
        })
    }

    /// Power `source` onto its node's subscription and, if connected,
    /// drive it toward `subscribed`.
    pub async fn add_observer(self: &Arc<Self>, source: &Source) {
        let Some((service, node)) = source.node_address() else {
            debug!(source_id = source.common.id, "add_observer: source has no node address, ignoring");
            return;
        };
        let key = SubscriptionKey::new(service, node);
        if let Err(err) = self.store.power_up(&key, source.common.id).await {
            warn!(?err, "add_observer: store power_up failed");
            return;
        }
        if self.connected.load(Ordering::SeqCst) {
            self.spawn_reconcile(key);
        }
    }

    /// De-power `source`; if it was the last observer, drive the node
    /// toward `unsubscribed`.
    pub async fn remove_observer(self: &Arc<Self>, source: &Source) {
        let Some((service, node)) = source.node_address() else { return };
        let key = SubscriptionKey::new(service, node);
        if let Err(err) = self.store.power_down(&key, source.common.id).await {
            warn!(?err, "remove_observer: store power_down failed");
            return;
        }
        if self.connected.load(Ordering::SeqCst) {
            self.spawn_reconcile(key);
        }
    }

    /// Underlying session came up: re-drive every persisted subscription
    /// toward its goal.
    pub async fn on_connected(self: &Arc<Self>) {
        self.connected.store(true, Ordering::SeqCst);
        for sub in self.store.list_subscriptions().await {
            self.spawn_reconcile(sub.key);
        }
    }

    /// Underlying session dropped: suspend outgoing calls and forget
    /// in-flight confirmation state (the peer forgot us too).
    pub async fn on_disconnected(self: &Arc<Self>) {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
        for mut sub in self.store.list_subscriptions().await {
            sub.state = SubscriptionState::Null;
            let _ = self.store.update_subscription(sub).await;
        }
    }

    /// Route an inbound items event to the observers of its subscription,
    /// dropping it if addressed elsewhere or unsubscribing a node we no
    /// longer recognize.
    pub async fn on_items_event(self: &Arc<Self>, event: ItemsEvent) {
        if event.recipient != self.own_address {
            debug!(recipient = %event.recipient, "on_items_event: not addressed to us, dropping");
            return;
        }
        let key = SubscriptionKey::new(event.sender_service.clone(), event.node.clone());
        let Some(sub) = self.store.get_subscription_by_key(&key).await else {
            info!(node = %event.node, "on_items_event: unknown node, unsubscribing and dropping");
            let fabric = self.fabric.clone();
            let node = event.node.clone();
            let subscriber = self.own_address.clone();
            tokio::spawn(async move {
                let _ = fabric.unsubscribe(&node, &subscriber).await;
            });
            return;
        };
        for source_id in sub.observers.clone() {
            let source = match self.store.get_source(source_id).await {
                Ok(source) => source,
                Err(err) => {
                    warn!(?err, source_id, "on_items_event: observer source vanished");
                    continue;
                }
            };
            for item in &event.items {
                self.sink.deliver(source.clone(), item.clone()).await;
            }
        }
    }

    /// Publish notifications as a single request; on `item-not-found`,
    /// create the node and retry exactly once.
    pub async fn publish_notifications(&self, node: &str, items: Vec<Element>) -> PubSubOutcome {
        let outcome = self.fabric.publish(node, items.clone()).await;
        match outcome {
            PubSubOutcome::Error(StanzaError { condition: StanzaCondition::ItemNotFound, .. }) => {
                let create = self.fabric.create_node(node).await;
                if !matches!(create, PubSubOutcome::Ok) {
                    return create;
                }
                self.fabric.publish(node, items).await
            }
            other => other,
        }
    }

    fn spawn_reconcile(self: &Arc<Self>, key: SubscriptionKey) {
        let this = self.clone();
        tokio::spawn(async move { this.reconcile(key).await });
    }

    async fn reconcile(self: Arc<Self>, key: SubscriptionKey) {
        {
            let mut pending = self.pending.lock().await;
            if pending.contains(&key) {
                return;
            }
            pending.insert(key.clone());
        }

        loop {
            if !self.connected.load(Ordering::SeqCst) {
                break;
            }
            let Some(sub) = self.store.get_subscription_by_key(&key).await else { break };
            let action = match (sub.state, sub.goal()) {
                (SubscriptionState::Null, SubscriptionState::Subscribed) => Action::Subscribe,
                (SubscriptionState::Subscribed, SubscriptionState::Unsubscribed) => Action::Unsubscribe,
                _ => break,
            };

            let outcome = match action {
                Action::Subscribe => self.fabric.subscribe(&key.node, &self.own_address).await,
                Action::Unsubscribe => self.fabric.unsubscribe(&key.node, &self.own_address).await,
            };

            match outcome {
                PubSubOutcome::Ok => {
                    let mut sub = sub;
                    sub.state = match action {
                        Action::Subscribe => SubscriptionState::Subscribed,
                        Action::Unsubscribe => SubscriptionState::Null,
                    };
                    let _ = self.store.update_subscription(sub).await;
                    self.backoff.lock().await.remove(&key);
                }
                PubSubOutcome::Error(StanzaError { condition: StanzaCondition::UnexpectedRequest, .. })
                    if matches!(action, Action::Unsubscribe) =>
                {
                    let mut sub = sub;
                    sub.state = SubscriptionState::Null;
                    let _ = self.store.update_subscription(sub).await;
                    self.backoff.lock().await.remove(&key);
                }
                PubSubOutcome::Error(StanzaError { condition, .. }) if condition.is_temporary() => {
                    let delay = self.bump_backoff(&key).await;
                    tokio::time::sleep(delay).await;
                }
                PubSubOutcome::Timeout => {
                    let delay = self.bump_backoff(&key).await;
                    tokio::time::sleep(delay).await;
                }
                PubSubOutcome::Error(err) => {
                    warn!(?err, node = %key.node, "reconcile: permanent failure, abandoning goal");
                    break;
                }
            }
        }

        self.pending.lock().await.remove(&key);
    }

    async fn bump_backoff(&self, key: &SubscriptionKey) -> Duration {
        let mut backoff = self.backoff.lock().await;
        let current = backoff.get(key).copied().unwrap_or(DELAY_INITIAL);
        let next = std::cmp::min(current * DELAY_FACTOR, DELAY_MAX);
        backoff.insert(key.clone(), next);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::test_support::MockFabricSession;
    use ikd_core::model::{SourceCommon, SourceKind};
    use ikd_core::MemoryStore;
    use ikd_protocol::{PubSubRequest, StanzaError as SE};
    use ikd_test_utils::{MockFabricPeer, ScriptedResponse};

    struct RecordingSink(Mutex<Vec<(i64, Element)>>);

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, source: Source, payload: Element) {
            self.0.lock().await.push((source.common.id, payload));
        }
    }

    fn simple_source(id: i64) -> Source {
        Source {
            common: SourceCommon { id, feed_id: 1, enabled: true, via: None, subscription_id: None },
            kind: SourceKind::Simple { service: "pubsub.example.com".to_owned(), node_identifier: "vote/1".to_owned() },
        }
    }

    #[tokio::test]
    async fn add_observer_subscribes_once_connected() {
        let (mut peer, handle) = MockFabricPeer::new();
        peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
        let serve = tokio::spawn(async move {
            peer.serve_one().await;
            peer
        });

        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(Arc::new(MockFabricSession(handle)), store.clone(), sink, "notifier@mediamatic.nl".to_owned());

        dispatcher.on_connected().await;
        dispatcher.add_observer(&simple_source(1)).await;

        let peer = serve.await.unwrap();
        assert_eq!(peer.recorded, vec![PubSubRequest::Subscribe { node: "vote/1".to_owned(), subscriber: "notifier@mediamatic.nl".to_owned() }]);
    }

    #[tokio::test]
    async fn unsubscribe_returning_unexpected_request_counts_as_success() {
        let (mut peer, handle) = MockFabricPeer::new();
        peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Ok));
        peer.push_response(ScriptedResponse::Outcome(PubSubOutcome::Error(SE {
            condition: ikd_protocol::StanzaCondition::UnexpectedRequest,
            text: None,
        })));
        let serve = tokio::spawn(async move {
            peer.serve_one().await;
            peer.serve_one().await;
            peer
        });

        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(Arc::new(MockFabricSession(handle)), store.clone(), sink, "notifier@mediamatic.nl".to_owned());

        dispatcher.on_connected().await;
        let source = simple_source(1);
        dispatcher.add_observer(&source).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.remove_observer(&source).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let key = SubscriptionKey::new("pubsub.example.com", "vote/1");
        let sub = store.get_subscription_by_key(&key).await.unwrap();
        assert_eq!(sub.state, SubscriptionState::Null);
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_node_event_triggers_unsubscribe_and_is_dropped() {
        let (mut peer, handle) = MockFabricPeer::new();
        let serve = tokio::spawn(async move {
            let req = peer.serve_one().await;
            (peer, req)
        });

        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(Arc::new(MockFabricSession(handle)), store, sink.clone(), "notifier@mediamatic.nl".to_owned());
        dispatcher.on_connected().await;

        dispatcher
            .on_items_event(ItemsEvent {
                sender_service: "pubsub.example.com".to_owned(),
                recipient: "notifier@mediamatic.nl".to_owned(),
                node: "unknown".to_owned(),
                items: vec![Element::new("entry")],
            })
            .await;

        let (_peer, req) = serve.await.unwrap();
        assert_eq!(req, Some(PubSubRequest::Unsubscribe { node: "unknown".to_owned(), subscriber: "notifier@mediamatic.nl".to_owned() }));
        assert!(sink.0.lock().await.is_empty());
    }

    #[tokio::test]
    async fn event_for_wrong_recipient_is_dropped() {
        let (_peer, handle) = MockFabricPeer::new();
        let store = MemoryStore::new();
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(Arc::new(MockFabricSession(handle)), store, sink.clone(), "notifier@mediamatic.nl".to_owned());

        dispatcher
            .on_items_event(ItemsEvent {
                sender_service: "pubsub.example.com".to_owned(),
                recipient: "someone-else@mediamatic.nl".to_owned(),
                node: "vote/1".to_owned(),
                items: vec![Element::new("entry")],
            })
            .await;

        assert!(sink.0.lock().await.is_empty());
    }
}
