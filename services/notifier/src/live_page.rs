//! Live-page WebSocket push.
//!
//! One route per feed: `GET /live/:feed_id`. On connect, replays the
//! attached [`LivePageAggregator`]'s bounded history in order, then
//! streams everything broadcast afterwards. A feed not wired to a live
//! page (or that doesn't exist) closes the socket immediately.

use crate::dispatcher::Publisher;
use crate::feed::FeedRouter;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use ikd_core::Store;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::info;

pub fn router<S: Store + 'static, P: Publisher + 'static>(feed_router: Arc<FeedRouter<S, P>>) -> Router {
    Router::new().route("/live/:feed_id", get(upgrade::<S, P>)).with_state(feed_router)
}

async fn upgrade<S: Store + 'static, P: Publisher + 'static>(
    ws: WebSocketUpgrade,
    State(feed_router): State<Arc<FeedRouter<S, P>>>,
    Path(feed_id): Path<i64>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, feed_router, feed_id))
}

async fn handle_socket<S: Store + 'static, P: Publisher + 'static>(mut socket: WebSocket, feed_router: Arc<FeedRouter<S, P>>, feed_id: i64) {
    let Some(live_page) = feed_router.live_page(feed_id).await else {
        info!(feed_id, "live page: no such feed or feed is not live-page backed, closing");
        return;
    };

    for notification in live_page.history().await {
        if send_notification(&mut socket, &notification).await.is_err() {
            return;
        }
    }

    let mut stream = BroadcastStream::new(live_page.subscribe());
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => {}
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(notification)) => {
                        if send_notification(&mut socket, &notification).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(_)) => continue,
                    None => return,
                }
            }
        }
    }
}

async fn send_notification(socket: &mut WebSocket, notification: &ikd_protocol::Notification) -> Result<(), axum::Error> {
    let json = serde_json::to_string(notification).expect("Notification always serializes");
    socket.send(Message::Text(json.into())).await
}
