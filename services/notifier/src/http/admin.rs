//! Admin JSON CRUD surface under `/api/v1/...`, in the route-table
//! style of `services/server`'s own
//! `build_router`. Updating a pub/sub-backed source whose derived node or
//! `enabled` changed resubscribes through the Dispatcher (`ResubscribeHook`);
//! updating a Twitter source refreshes the Microblog Dispatcher's union
//! filter (`FilterRefreshHook`). Both hooks are narrow traits rather than
//! the concrete generic types, the same decoupling the Dispatcher/Aggregator
//! boundary already uses for `Publisher`/`EventSink`.
//!
//! `things` and `sites` are reference records rather than dispatcher
//! state, so their routes are plain CRUD over the store with no hooks.

use crate::http::response::{bad_request, conflict, not_found};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use ikd_core::model::{Site, Source, Thing};
use ikd_core::{Store, StoreError};
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait ResubscribeHook: Send + Sync {
    async fn on_source_added(&self, source: &Source);
    async fn on_source_removed(&self, source: &Source);
}

#[async_trait]
pub trait FilterRefreshHook: Send + Sync {
    async fn on_sources_changed(&self);
}

#[derive(Clone)]
pub struct AdminState<S: Store> {
    store: Arc<S>,
    resubscribe: Arc<dyn ResubscribeHook>,
    filters: Arc<dyn FilterRefreshHook>,
}

impl<S: Store + 'static> AdminState<S> {
    pub fn new(store: Arc<S>, resubscribe: Arc<dyn ResubscribeHook>, filters: Arc<dyn FilterRefreshHook>) -> Self {
        AdminState { store, resubscribe, filters }
    }
}

pub fn router<S: Store + 'static>(state: AdminState<S>) -> Router {
    Router::new()
        .route("/api/v1/feeds", get(list_feeds::<S>).post(create_feed::<S>))
        .route("/api/v1/feeds/:id", get(get_feed::<S>).patch(patch_feed::<S>).delete(delete_feed::<S>))
        .route("/api/v1/feeds/:id/sources", get(list_sources::<S>).post(create_source::<S>))
        .route("/api/v1/sources/:id", patch(patch_source::<S>).delete(delete_source::<S>))
        .route("/api/v1/things", get(list_things::<S>).post(create_thing::<S>))
        .route("/api/v1/things/:id", get(get_thing::<S>).delete(delete_thing::<S>))
        .route("/api/v1/sites", get(list_sites::<S>).post(create_site::<S>))
        .route("/api/v1/sites/:id", get(get_site::<S>).delete(delete_site::<S>))
        .with_state(state)
}

fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound { kind, id } => not_found(format!("no such {kind} with id {id}")),
        StoreError::DuplicateHandle(handle) => conflict(format!("a feed with handle {handle:?} already exists")),
        StoreError::DuplicateSubscription { service, node } => conflict(format!("a subscription for {service}/{node} already exists")),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

async fn list_feeds<S: Store + 'static>(State(state): State<AdminState<S>>) -> Response {
    Json(state.store.list_feeds().await).into_response()
}

async fn create_feed<S: Store + 'static>(State(state): State<AdminState<S>>, Json(feed): Json<ikd_core::model::Feed>) -> Response {
    match state.store.put_feed(feed).await {
        Ok(feed) => (StatusCode::CREATED, Json(feed)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn get_feed<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.get_feed(id).await {
        Ok(feed) => Json(feed).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn patch_feed<S: Store + 'static>(
    State(state): State<AdminState<S>>,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mut feed = match state.store.get_feed(id).await {
        Ok(feed) => feed,
        Err(err) => return store_error_response(err),
    };
    if let Some(title) = body.get("title").and_then(|v| v.as_str()) {
        feed.title = title.to_owned();
    }
    match state.store.put_feed(feed).await {
        Ok(feed) => Json(feed).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn delete_feed<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.delete_feed(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn list_sources<S: Store + 'static>(State(state): State<AdminState<S>>, Path(feed_id): Path<i64>) -> Response {
    Json(state.store.sources_for_feed(feed_id).await).into_response()
}

async fn create_source<S: Store + 'static>(
    State(state): State<AdminState<S>>,
    Path(feed_id): Path<i64>,
    Json(mut source): Json<Source>,
) -> Response {
    source.common.feed_id = feed_id;
    source.common.id = 0;
    let source = match state.store.put_source(source).await {
        Ok(source) => source,
        Err(err) => return store_error_response(err),
    };
    if source.node_address().is_some() && source.common.enabled {
        state.resubscribe.on_source_added(&source).await;
    }
    if matches!(source.kind, ikd_core::model::SourceKind::Twitter { .. }) {
        state.filters.on_sources_changed().await;
    }
    (StatusCode::CREATED, Json(source)).into_response()
}

async fn patch_source<S: Store + 'static>(
    State(state): State<AdminState<S>>,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let before = match state.store.get_source(id).await {
        Ok(source) => source,
        Err(err) => return store_error_response(err),
    };
    let Some(enabled) = body.get("enabled").and_then(|v| v.as_bool()) else {
        return bad_request("expected a boolean \"enabled\" field");
    };

    let mut after = before.clone();
    after.common.enabled = enabled;
    let after = match state.store.put_source(after).await {
        Ok(source) => source,
        Err(err) => return store_error_response(err),
    };

    if before.common.enabled != after.common.enabled && after.node_address().is_some() {
        if after.common.enabled {
            state.resubscribe.on_source_added(&after).await;
        } else {
            state.resubscribe.on_source_removed(&before).await;
        }
    }
    if matches!(after.kind, ikd_core::model::SourceKind::Twitter { .. }) {
        state.filters.on_sources_changed().await;
    }

    Json(after).into_response()
}

async fn delete_source<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    let source = match state.store.get_source(id).await {
        Ok(source) => source,
        Err(err) => return store_error_response(err),
    };
    if let Err(err) = state.store.delete_source(id).await {
        return store_error_response(err);
    }
    if source.node_address().is_some() && source.common.enabled {
        state.resubscribe.on_source_removed(&source).await;
    }
    if matches!(source.kind, ikd_core::model::SourceKind::Twitter { .. }) {
        state.filters.on_sources_changed().await;
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Serialize)]
struct ThingView {
    id: i64,
    title: String,
    uri: String,
}

impl ThingView {
    fn from(id: i64, thing: Thing) -> Self {
        ThingView { id, title: thing.title, uri: thing.uri }
    }
}

#[derive(Serialize)]
struct SiteView {
    id: i64,
    title: String,
    uri: String,
}

impl SiteView {
    fn from(id: i64, site: Site) -> Self {
        SiteView { id, title: site.title, uri: site.uri }
    }
}

async fn list_things<S: Store + 'static>(State(state): State<AdminState<S>>) -> Response {
    let things: Vec<ThingView> = state.store.list_things().await.into_iter().map(|(id, thing)| ThingView::from(id, thing)).collect();
    Json(things).into_response()
}

async fn create_thing<S: Store + 'static>(State(state): State<AdminState<S>>, Json(thing): Json<Thing>) -> Response {
    match state.store.put_thing(thing).await {
        Ok((id, thing)) => (StatusCode::CREATED, Json(ThingView::from(id, thing))).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn get_thing<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.get_thing(id).await {
        Ok(thing) => Json(ThingView::from(id, thing)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn delete_thing<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.delete_thing(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn list_sites<S: Store + 'static>(State(state): State<AdminState<S>>) -> Response {
    let sites: Vec<SiteView> = state.store.list_sites().await.into_iter().map(|(id, site)| SiteView::from(id, site)).collect();
    Json(sites).into_response()
}

async fn create_site<S: Store + 'static>(State(state): State<AdminState<S>>, Json(site): Json<Site>) -> Response {
    match state.store.put_site(site).await {
        Ok((id, site)) => (StatusCode::CREATED, Json(SiteView::from(id, site))).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn get_site<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.get_site(id).await {
        Ok(site) => Json(SiteView::from(id, site)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn delete_site<S: Store + 'static>(State(state): State<AdminState<S>>, Path(id): Path<i64>) -> Response {
    match state.store.delete_site(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}
