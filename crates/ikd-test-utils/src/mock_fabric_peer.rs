//! A scriptable pub/sub peer over an in-process channel transport.
//!
//! Mirrors `MockWsServer`'s shape (accept requests, script responses,
//! record what was sent) but the message fabric has no concrete socket
//! framing in scope — so the transport here is a pair of `tokio::sync`
//! channels instead of a bound TCP port.
//! The real `services/notifier` adapter and this mock both speak
//! `ikd-protocol`'s wire types directly.

use ikd_protocol::{ItemsEvent, PubSubOutcome, PubSubRequest};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Outcome(PubSubOutcome),
    DelayThenOutcome(Duration, PubSubOutcome),
}

/// The dispatcher-side handle: send requests, receive inbound events.
pub struct FabricHandle {
    request_tx: mpsc::Sender<(PubSubRequest, oneshot::Sender<PubSubOutcome>)>,
    event_rx: Mutex<mpsc::Receiver<ItemsEvent>>,
}

impl FabricHandle {
    pub async fn send(&self, request: PubSubRequest) -> PubSubOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.request_tx.send((request, reply_tx)).await.is_err() {
            return PubSubOutcome::Timeout;
        }
        reply_rx.await.unwrap_or(PubSubOutcome::Timeout)
    }

    pub async fn next_event(&self) -> Option<ItemsEvent> {
        self.event_rx.lock().await.recv().await
    }
}

/// The test-side controller: scripts responses, records what arrived,
/// and can push unsolicited items events.
pub struct MockFabricPeer {
    request_rx: mpsc::Receiver<(PubSubRequest, oneshot::Sender<PubSubOutcome>)>,
    event_tx: mpsc::Sender<ItemsEvent>,
    script: VecDeque<ScriptedResponse>,
    pub recorded: Vec<PubSubRequest>,
}

impl MockFabricPeer {
    pub fn new() -> (MockFabricPeer, FabricHandle) {
        let (request_tx, request_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);
        (
            MockFabricPeer { request_rx, event_tx, script: VecDeque::new(), recorded: Vec::new() },
            FabricHandle { request_tx, event_rx: Mutex::new(event_rx) },
        )
    }

    /// Queue the outcome for the next request this peer serves, FIFO.
    pub fn push_response(&mut self, response: ScriptedResponse) {
        self.script.push_back(response);
    }

    /// Serve exactly one request, replying with the next scripted outcome
    /// (defaulting to `Ok` if the script is empty). Returns the request
    /// that was served, or `None` if the handle side has dropped.
    pub async fn serve_one(&mut self) -> Option<PubSubRequest> {
        let (request, reply) = self.request_rx.recv().await?;
        self.recorded.push(request.clone());
        match self.script.pop_front().unwrap_or(ScriptedResponse::Outcome(PubSubOutcome::Ok)) {
            ScriptedResponse::Outcome(outcome) => {
                let _ = reply.send(outcome);
            }
            ScriptedResponse::DelayThenOutcome(delay, outcome) => {
                tokio::time::sleep(delay).await;
                let _ = reply.send(outcome);
            }
        }
        Some(request)
    }

    /// Serve requests in a loop until the handle is dropped.
    pub async fn serve_forever(mut self) {
        while self.serve_one().await.is_some() {}
    }

    /// Push an unsolicited inbound items event to the dispatcher side.
    pub async fn emit_event(&self, event: ItemsEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
