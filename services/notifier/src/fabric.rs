//! The message-fabric session boundary that the Dispatcher and Pinger
//! call through.
//!
//! The concrete XML stanza framing is out of scope; this module owns the
//! thin adapter in its place. [`WsFabricSession`] carries
//! the same `(service, node, subscriber)` request/outcome/event shapes
//! (`ikd_protocol::pubsub`) over a WebSocket transport, in the same
//! connect/hello/background-reader shape as `services/server`'s own
//! uplink session for its long-lived duplex connection. Tests exercise the
//! Dispatcher against [`ikd_test_utils::FabricHandle`] through the same
//! trait instead of a real socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ikd_protocol::xml::Element;
use ikd_protocol::{ItemsEvent, PubSubOutcome, PubSubRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};
use uuid::Uuid;

/// What the Dispatcher and Pinger need from the fabric, independent of
/// transport. Implemented by [`WsFabricSession`] for the real service and
/// by a channel-backed adapter in tests.
#[async_trait]
pub trait FabricSession: Send + Sync {
    async fn subscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome;
    async fn unsubscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome;
    async fn create_node(&self, node: &str) -> PubSubOutcome;
    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome;
    async fn items_query(&self, node: &str, max_items: u32) -> PubSubOutcome;
    /// Request/response liveness ping; a bare `Ok`/`Error`/`Timeout`
    /// with no node of its own.
    async fn ping(&self) -> PubSubOutcome;
    /// Pull the next unsolicited inbound items event, if any is queued.
    async fn next_event(&self) -> Option<ItemsEvent>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum WireMessage {
    Request { id: Uuid, request: PubSubRequest },
    Response { id: Uuid, outcome: PubSubOutcome },
    Event(ItemsEvent),
    Ping { id: Uuid },
    Pong { id: Uuid },
}

#[derive(Debug)]
pub enum FabricError {
    Connect(String),
    Ws(String),
    Disconnected,
}

impl std::fmt::Display for FabricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FabricError::Connect(s) => write!(f, "fabric connect error: {s}"),
            FabricError::Ws(s) => write!(f, "fabric transport error: {s}"),
            FabricError::Disconnected => write!(f, "fabric session disconnected"),
        }
    }
}

impl std::error::Error for FabricError {}

type PendingMap = Arc<Mutex<HashMap<Uuid, oneshot::Sender<PubSubOutcome>>>>;

/// A live fabric session over a WebSocket transport.
///
/// `connect` performs the handshake and spawns a background task that
/// reads inbound frames, resolves pending request futures by id, and
/// forwards unsolicited `Event` frames to an internal queue. Outbound
/// frames go through a single writer task fed by an mpsc channel, so
/// `subscribe`/`unsubscribe`/`publish`/`ping` can all be called
/// concurrently from the Dispatcher and Pinger.
pub struct WsFabricSession {
    outbound_tx: mpsc::Sender<Message>,
    pending: PendingMap,
    events: Mutex<mpsc::Receiver<ItemsEvent>>,
    _reader_task: tokio::task::JoinHandle<()>,
    _writer_task: tokio::task::JoinHandle<()>,
}

impl WsFabricSession {
    pub async fn connect(url: &str, bearer_secret: &str) -> Result<Self, FabricError> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = url.into_client_request().map_err(|e| FabricError::Connect(format!("invalid fabric url '{url}': {e}")))?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {bearer_secret}")
                .parse()
                .map_err(|e: tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue| FabricError::Connect(e.to_string()))?,
        );

        let (ws, _response) = tokio_tungstenite::connect_async(request).await.map_err(|e| FabricError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, events_rx) = mpsc::channel(64);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_reply_tx = outbound_tx.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                let Ok(Message::Text(text)) = next else { continue };
                let Ok(wire) = serde_json::from_str::<WireMessage>(&text) else {
                    warn!("fabric: unparseable frame, dropping");
                    continue;
                };
                match wire {
                    WireMessage::Response { id, outcome } => {
                        if let Some(tx) = reader_pending.lock().await.remove(&id) {
                            let _ = tx.send(outcome);
                        }
                    }
                    WireMessage::Event(event) => {
                        let _ = events_tx.send(event).await;
                    }
                    WireMessage::Ping { id } => {
                        let pong = serde_json::to_string(&WireMessage::Pong { id }).unwrap_or_default();
                        let _ = reader_reply_tx.send(Message::Text(pong.into())).await;
                    }
                    WireMessage::Request { .. } | WireMessage::Pong { .. } => {
                        debug!("fabric: ignoring inbound frame not expected from a peer session");
                    }
                }
            }
        });

        Ok(WsFabricSession {
            outbound_tx,
            pending,
            events: Mutex::new(events_rx),
            _reader_task: reader_task,
            _writer_task: writer_task,
        })
    }

    async fn roundtrip(&self, request: PubSubRequest) -> PubSubOutcome {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);

        let frame = match serde_json::to_string(&WireMessage::Request { id, request }) {
            Ok(frame) => frame,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return PubSubOutcome::Timeout;
            }
        };
        if self.outbound_tx.send(Message::Text(frame.into())).await.is_err() {
            self.pending.lock().await.remove(&id);
            return PubSubOutcome::Timeout;
        }

        match tokio::time::timeout(ikd_protocol::pubsub::REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            _ => {
                self.pending.lock().await.remove(&id);
                PubSubOutcome::Timeout
            }
        }
    }
}

#[async_trait]
impl FabricSession for WsFabricSession {
    async fn subscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::Subscribe { node: node.to_owned(), subscriber: subscriber.to_owned() }).await
    }

    async fn unsubscribe(&self, node: &str, subscriber: &str) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::Unsubscribe { node: node.to_owned(), subscriber: subscriber.to_owned() }).await
    }

    async fn create_node(&self, node: &str) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::CreateNode { node: node.to_owned() }).await
    }

    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::Publish { node: node.to_owned(), items }).await
    }

    async fn items_query(&self, node: &str, max_items: u32) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::ItemsQuery { node: node.to_owned(), max_items }).await
    }

    async fn ping(&self) -> PubSubOutcome {
        self.roundtrip(PubSubRequest::Ping).await
    }

    async fn next_event(&self) -> Option<ItemsEvent> {
        self.events.lock().await.recv().await
    }
}
