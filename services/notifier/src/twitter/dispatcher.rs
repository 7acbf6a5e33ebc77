//! Microblog Dispatcher: owns the union filter across every
//! enabled Twitter source and fans matching statuses out through the
//! formatter into [`FeedRouter`].

use crate::feed::FeedRouter;
use crate::twitter::monitor::{Monitor, MonitorDelegate};
use async_trait::async_trait;
use ikd_core::image::{augment_status_with_image, ImageResolver};
use ikd_core::model::SourceKind;
use ikd_core::{formatter, Store};
use ikd_protocol::{Status, StreamFilterArgs};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct MicroblogDispatcher<S: Store, P: crate::dispatcher::Publisher, R: ImageResolver> {
    store: Arc<S>,
    router: Arc<FeedRouter<S, P>>,
    monitor: Arc<Monitor>,
    image_resolver: Arc<R>,
    last_args: Mutex<StreamFilterArgs>,
}

impl<S, P, R> MicroblogDispatcher<S, P, R>
where
    S: Store + 'static,
    P: crate::dispatcher::Publisher + 'static,
    R: ImageResolver + 'static,
{
    pub fn new(store: Arc<S>, router: Arc<FeedRouter<S, P>>, monitor: Arc<Monitor>, image_resolver: Arc<R>) -> Arc<Self> {
        Arc::new(MicroblogDispatcher { store, router, monitor, image_resolver, last_args: Mutex::new(StreamFilterArgs::default()) })
    }

    /// Union of `terms`/`user_ids` across every enabled Twitter source, in
    /// every feed.
    async fn collect_filters(&self) -> (Vec<String>, Vec<String>) {
        let mut terms = Vec::new();
        let mut user_ids = Vec::new();
        for feed in self.store.list_feeds().await {
            for source in self.store.sources_for_feed(feed.id).await {
                if !source.common.enabled {
                    continue;
                }
                if let SourceKind::Twitter { terms: t, user_ids: u } = &source.kind {
                    for term in t {
                        if !terms.contains(term) {
                            terms.push(term.clone());
                        }
                    }
                    for id in u {
                        if !user_ids.contains(id) {
                            user_ids.push(id.clone());
                        }
                    }
                }
            }
        }
        (terms, user_ids)
    }

    fn build_args(terms: &[String], user_ids: &[String]) -> StreamFilterArgs {
        let track = terms.iter().map(|t| t.trim_matches('"').to_owned()).collect::<Vec<_>>().join(",");
        let follow = user_ids.join(",");
        StreamFilterArgs { track, follow }
    }

    /// Recompute the union and push it to the monitor, clearing the
    /// delegate entirely when the union is empty so the monitor's own
    /// connect loop stays idle.
    pub async fn set_filters(self: &Arc<Self>) {
        let (terms, user_ids) = self.collect_filters().await;
        let args = Self::build_args(&terms, &user_ids);
        let delegate: Option<Arc<dyn MonitorDelegate>> = if args.is_empty() { None } else { Some(self.clone()) };
        *self.last_args.lock().await = args.clone();
        self.monitor.set_filters(args, delegate).await;
    }

    /// Recompute and reconnect only if the union actually changed:
    /// toggling `enabled` on a source that doesn't move the union must
    /// not force a stream restart.
    pub async fn refresh_filters(self: &Arc<Self>) {
        let (terms, user_ids) = self.collect_filters().await;
        let args = Self::build_args(&terms, &user_ids);
        let mut last_args = self.last_args.lock().await;
        if *last_args == args {
            return;
        }
        *last_args = args.clone();
        drop(last_args);
        let delegate: Option<Arc<dyn MonitorDelegate>> = if args.is_empty() { None } else { Some(self.clone()) };
        self.monitor.set_filters(args, delegate).await;
    }
}

/// What the admin CRUD surface needs after a Twitter source changes.
#[async_trait]
impl<S, P, R> crate::http::FilterRefreshHook for Arc<MicroblogDispatcher<S, P, R>>
where
    S: Store + 'static,
    P: crate::dispatcher::Publisher + 'static,
    R: ImageResolver + 'static,
{
    async fn on_sources_changed(&self) {
        self.refresh_filters().await;
    }
}

#[async_trait]
impl<S, P, R> MonitorDelegate for MicroblogDispatcher<S, P, R>
where
    S: Store + 'static,
    P: crate::dispatcher::Publisher + 'static,
    R: ImageResolver + 'static,
{
    async fn on_entry(&self, mut status: Status) {
        augment_status_with_image(&mut status, self.image_resolver.as_ref()).await;

        for feed in self.store.list_feeds().await {
            for source in self.store.sources_for_feed(feed.id).await {
                if !source.common.enabled {
                    continue;
                }
                let SourceKind::Twitter { terms, user_ids } = &source.kind else { continue };
                match formatter::format_twitter(terms, user_ids, &status) {
                    Some(notification) => self.router.deliver_notification(&source, notification).await,
                    None => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedRouter;
    use ikd_core::model::{Feed, Language, AggregatorRef, SourceCommon};
    use ikd_core::MemoryStore;
    use ikd_protocol::PubSubOutcome;

    struct StubPublisher;

    #[async_trait]
    impl crate::dispatcher::Publisher for StubPublisher {
        async fn publish(&self, _node: &str, _items: Vec<ikd_protocol::Element>) -> PubSubOutcome {
            PubSubOutcome::Ok
        }
    }

    struct NoopResolver;

    #[async_trait]
    impl ImageResolver for NoopResolver {
        async fn resolve(&self, _url: &str, _kind: ikd_core::image::ResolverKind) -> Option<String> {
            None
        }
    }

    fn twitter_source(feed_id: i64, terms: &[&str], enabled: bool) -> ikd_core::model::Source {
        ikd_core::model::Source {
            common: SourceCommon { id: 0, feed_id, enabled, via: None, subscription_id: None },
            kind: SourceKind::Twitter { terms: terms.iter().map(|s| s.to_string()).collect(), user_ids: vec![] },
        }
    }

    async fn setup() -> (Arc<MicroblogDispatcher<MemoryStore, StubPublisher, NoopResolver>>, Arc<MemoryStore>) {
        let store = MemoryStore::new();
        let router = FeedRouter::new(store.clone(), Arc::new(StubPublisher), 13);
        let monitor = Monitor::new("http://127.0.0.1:1/stream", crate::twitter::monitor::TwitterCredentials {
            consumer_key: "k".to_owned(),
            consumer_secret: "s".to_owned(),
            access_token: "t".to_owned(),
            access_token_secret: "ts".to_owned(),
        });
        let dispatcher = MicroblogDispatcher::new(store.clone(), router, monitor, Arc::new(NoopResolver));
        (dispatcher, store)
    }

    #[tokio::test]
    async fn collect_filters_unions_enabled_twitter_sources() {
        let (dispatcher, store) = setup().await;
        let feed = store
            .put_feed(Feed { id: 0, handle: "f".to_owned(), title: "F".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::LivePage })
            .await
            .unwrap();
        store.put_source(twitter_source(feed.id, &["rust"], true)).await.unwrap();
        store.put_source(twitter_source(feed.id, &["async"], false)).await.unwrap();

        let (terms, _) = dispatcher.collect_filters().await;
        assert_eq!(terms, vec!["rust".to_owned()]);
    }

    #[tokio::test]
    async fn refresh_filters_is_a_noop_when_union_is_unchanged() {
        let (dispatcher, store) = setup().await;
        let feed = store
            .put_feed(Feed { id: 0, handle: "f".to_owned(), title: "F".to_owned(), language: Language::En, aggregator_ref: AggregatorRef::LivePage })
            .await
            .unwrap();
        let source = store.put_source(twitter_source(feed.id, &["rust"], true)).await.unwrap();
        dispatcher.set_filters().await;
        let args_after_first = dispatcher.last_args.lock().await.clone();

        // Add a second, already-covered source: union is unchanged.
        store.put_source(twitter_source(feed.id, &["rust"], true)).await.unwrap();
        dispatcher.refresh_filters().await;
        let args_after_second = dispatcher.last_args.lock().await.clone();
        assert_eq!(args_after_first, args_after_second);

        let mut disabled = source.clone();
        disabled.common.enabled = false;
        store.put_source(disabled).await.unwrap();
        dispatcher.refresh_filters().await;
        // only the still-enabled duplicate term remains, union unchanged
        assert_eq!(dispatcher.last_args.lock().await.clone(), args_after_second);
    }
}
