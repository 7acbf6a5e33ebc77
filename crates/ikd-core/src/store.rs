//! Persistent Source Registry gateway.
//!
//! The cyclic Feed⇄Source⇄Subscription object graph becomes a relational
//! shape keyed by stable integer ids behind this trait.
//! The on-disk store engine itself is peripheral; what's core is the typed
//! CRUD + power-up membership shape. [`MemoryStore`] is the shipped
//! implementation — a `tokio::sync::RwLock`-guarded registry mirroring the
//! `AppState` pattern, with JSON snapshot/restore for restart continuity.

use crate::model::{Feed, Site, Source, Subscription, SubscriptionKey, Thing};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such {kind} with id {id}")]
    NotFound { kind: &'static str, id: i64 },
    #[error("a feed with handle {0:?} already exists")]
    DuplicateHandle(String),
    #[error("a subscription for {service}/{node} already exists")]
    DuplicateSubscription { service: String, node: String },
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn put_feed(&self, feed: Feed) -> Result<Feed, StoreError>;
    async fn get_feed(&self, id: i64) -> Result<Feed, StoreError>;
    async fn get_feed_by_handle(&self, handle: &str) -> Result<Feed, StoreError>;
    async fn delete_feed(&self, id: i64) -> Result<(), StoreError>;
    async fn list_feeds(&self) -> Vec<Feed>;

    async fn put_source(&self, source: Source) -> Result<Source, StoreError>;
    async fn get_source(&self, id: i64) -> Result<Source, StoreError>;
    async fn delete_source(&self, id: i64) -> Result<(), StoreError>;
    async fn sources_for_feed(&self, feed_id: i64) -> Vec<Source>;

    async fn put_subscription(&self, key: SubscriptionKey) -> Result<Subscription, StoreError>;
    async fn get_subscription(&self, id: i64) -> Result<Subscription, StoreError>;
    async fn get_subscription_by_key(&self, key: &SubscriptionKey) -> Option<Subscription>;
    async fn update_subscription(&self, sub: Subscription) -> Result<(), StoreError>;
    async fn list_subscriptions(&self) -> Vec<Subscription>;

    async fn put_thing(&self, thing: Thing) -> Result<(i64, Thing), StoreError>;
    async fn get_thing(&self, id: i64) -> Result<Thing, StoreError>;
    async fn delete_thing(&self, id: i64) -> Result<(), StoreError>;
    async fn list_things(&self) -> Vec<(i64, Thing)>;

    async fn put_site(&self, site: Site) -> Result<(i64, Site), StoreError>;
    async fn get_site(&self, id: i64) -> Result<Site, StoreError>;
    async fn delete_site(&self, id: i64) -> Result<(), StoreError>;
    async fn list_sites(&self) -> Vec<(i64, Site)>;

    /// Power `source_id` onto `sub_key`'s subscription, creating it with
    /// goal `null` if absent, and return the resulting observer count.
    async fn power_up(&self, sub_key: &SubscriptionKey, source_id: i64) -> Result<Subscription, StoreError>;
    /// De-power `source_id`; returns the resulting subscription if it still
    /// exists (it is never deleted, only driven toward `unsubscribed`).
    async fn power_down(&self, sub_key: &SubscriptionKey, source_id: i64) -> Result<Subscription, StoreError>;
}

#[derive(Default)]
struct Tables {
    feeds: HashMap<i64, Feed>,
    sources: HashMap<i64, Source>,
    subscriptions: HashMap<i64, Subscription>,
    subscription_index: HashMap<SubscriptionKey, i64>,
    things: HashMap<i64, Thing>,
    sites: HashMap<i64, Site>,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore { tables: RwLock::new(Tables::default()), next_id: AtomicI64::new(1) })
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Serialize a restart-continuity snapshot; the store engine
    /// itself stays in-memory, this just persists/restores its contents.
    pub async fn snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let tables = self.tables.read().await;
        let feeds: Vec<&Feed> = tables.feeds.values().collect();
        Ok(serde_json::to_vec(&SnapshotView { feeds })?)
    }

    /// Load a snapshot produced by [`Self::snapshot`], restoring feeds and
    /// bumping the id allocator past the highest one seen so new records
    /// never collide with a restored one.
    pub async fn restore(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let data: SnapshotData = serde_json::from_slice(bytes)?;
        let mut max_id = 0;
        let mut tables = self.tables.write().await;
        for feed in data.feeds {
            max_id = max_id.max(feed.id);
            tables.feeds.insert(feed.id, feed);
        }
        drop(tables);
        self.next_id.fetch_max(max_id + 1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct SnapshotView<'a> {
    feeds: Vec<&'a Feed>,
}

#[derive(serde::Deserialize)]
struct SnapshotData {
    feeds: Vec<Feed>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_feed(&self, mut feed: Feed) -> Result<Feed, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.feeds.values().any(|f| f.handle == feed.handle && f.id != feed.id) {
            return Err(StoreError::DuplicateHandle(feed.handle));
        }
        if feed.id == 0 {
            feed.id = self.alloc_id();
        }
        tables.feeds.insert(feed.id, feed.clone());
        Ok(feed)
    }

    async fn get_feed(&self, id: i64) -> Result<Feed, StoreError> {
        self.tables.read().await.feeds.get(&id).cloned().ok_or(StoreError::NotFound { kind: "feed", id })
    }

    async fn get_feed_by_handle(&self, handle: &str) -> Result<Feed, StoreError> {
        self.tables
            .read()
            .await
            .feeds
            .values()
            .find(|f| f.handle == handle)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "feed", id: 0 })
    }

    async fn delete_feed(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.feeds.remove(&id).ok_or(StoreError::NotFound { kind: "feed", id })?;
        let dead: Vec<i64> =
            tables.sources.values().filter(|s| s.common.feed_id == id).map(|s| s.common.id).collect();
        for source_id in dead {
            tables.sources.remove(&source_id);
        }
        Ok(())
    }

    async fn list_feeds(&self) -> Vec<Feed> {
        self.tables.read().await.feeds.values().cloned().collect()
    }

    async fn put_source(&self, mut source: Source) -> Result<Source, StoreError> {
        let mut tables = self.tables.write().await;
        if source.common.id == 0 {
            source.common.id = self.alloc_id();
        }
        tables.sources.insert(source.common.id, source.clone());
        Ok(source)
    }

    async fn get_source(&self, id: i64) -> Result<Source, StoreError> {
        self.tables.read().await.sources.get(&id).cloned().ok_or(StoreError::NotFound { kind: "source", id })
    }

    async fn delete_source(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.sources.remove(&id).ok_or(StoreError::NotFound { kind: "source", id })?;
        Ok(())
    }

    async fn sources_for_feed(&self, feed_id: i64) -> Vec<Source> {
        self.tables.read().await.sources.values().filter(|s| s.common.feed_id == feed_id).cloned().collect()
    }

    async fn put_subscription(&self, key: SubscriptionKey) -> Result<Subscription, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.subscription_index.contains_key(&key) {
            return Err(StoreError::DuplicateSubscription { service: key.service, node: key.node });
        }
        let id = self.alloc_id();
        let sub = Subscription::new(id, key.clone());
        tables.subscription_index.insert(key, id);
        tables.subscriptions.insert(id, sub.clone());
        Ok(sub)
    }

    async fn get_subscription(&self, id: i64) -> Result<Subscription, StoreError> {
        self.tables.read().await.subscriptions.get(&id).cloned().ok_or(StoreError::NotFound { kind: "subscription", id })
    }

    async fn get_subscription_by_key(&self, key: &SubscriptionKey) -> Option<Subscription> {
        let tables = self.tables.read().await;
        let id = tables.subscription_index.get(key)?;
        tables.subscriptions.get(id).cloned()
    }

    async fn update_subscription(&self, sub: Subscription) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.subscriptions.contains_key(&sub.id) {
            return Err(StoreError::NotFound { kind: "subscription", id: sub.id });
        }
        tables.subscriptions.insert(sub.id, sub);
        Ok(())
    }

    async fn list_subscriptions(&self) -> Vec<Subscription> {
        self.tables.read().await.subscriptions.values().cloned().collect()
    }

    async fn put_thing(&self, thing: Thing) -> Result<(i64, Thing), StoreError> {
        let mut tables = self.tables.write().await;
        let id = thing.id().unwrap_or_else(|| self.alloc_id());
        tables.things.insert(id, thing.clone());
        Ok((id, thing))
    }

    async fn get_thing(&self, id: i64) -> Result<Thing, StoreError> {
        self.tables.read().await.things.get(&id).cloned().ok_or(StoreError::NotFound { kind: "thing", id })
    }

    async fn delete_thing(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.things.remove(&id).ok_or(StoreError::NotFound { kind: "thing", id })?;
        Ok(())
    }

    async fn list_things(&self) -> Vec<(i64, Thing)> {
        self.tables.read().await.things.iter().map(|(id, thing)| (*id, thing.clone())).collect()
    }

    async fn put_site(&self, site: Site) -> Result<(i64, Site), StoreError> {
        let mut tables = self.tables.write().await;
        let id = site.id().unwrap_or_else(|| self.alloc_id());
        tables.sites.insert(id, site.clone());
        Ok((id, site))
    }

    async fn get_site(&self, id: i64) -> Result<Site, StoreError> {
        self.tables.read().await.sites.get(&id).cloned().ok_or(StoreError::NotFound { kind: "site", id })
    }

    async fn delete_site(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.sites.remove(&id).ok_or(StoreError::NotFound { kind: "site", id })?;
        Ok(())
    }

    async fn list_sites(&self) -> Vec<(i64, Site)> {
        self.tables.read().await.sites.iter().map(|(id, site)| (*id, site.clone())).collect()
    }

    async fn power_up(&self, sub_key: &SubscriptionKey, source_id: i64) -> Result<Subscription, StoreError> {
        let mut tables = self.tables.write().await;
        let id = match tables.subscription_index.get(sub_key) {
            Some(id) => *id,
            None => {
                let id = self.alloc_id();
                tables.subscription_index.insert(sub_key.clone(), id);
                tables.subscriptions.insert(id, Subscription::new(id, sub_key.clone()));
                id
            }
        };
        let sub = tables.subscriptions.get_mut(&id).expect("just inserted or found");
        sub.power_up(source_id);
        Ok(sub.clone())
    }

    async fn power_down(&self, sub_key: &SubscriptionKey, source_id: i64) -> Result<Subscription, StoreError> {
        let mut tables = self.tables.write().await;
        let id = *tables
            .subscription_index
            .get(sub_key)
            .ok_or(StoreError::NotFound { kind: "subscription", id: 0 })?;
        let sub = tables.subscriptions.get_mut(&id).expect("indexed subscription must exist");
        sub.power_down(source_id);
        Ok(sub.clone())
    }
}
