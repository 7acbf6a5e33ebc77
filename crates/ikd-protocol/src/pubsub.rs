//! Wire-level request/response/event shapes for the pub/sub messaging fabric.
//!
//! These are the payloads the Dispatcher (in `services/notifier`) sends
//! and receives through the `MessageFabricSession` boundary. The concrete
//! XML stanza framing is out of scope; this module only defines the
//! typed shapes that framing carries.

use crate::xml::Element;
use std::time::Duration;

/// A request the Dispatcher issues against `(service, node)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PubSubRequest {
    Subscribe { node: String, subscriber: String },
    Unsubscribe { node: String, subscriber: String },
    CreateNode { node: String },
    Publish { node: String, items: Vec<Element> },
    ItemsQuery { node: String, max_items: u32 },
    /// Liveness ping, not scoped to a node.
    Ping,
}

/// Stanza error conditions actionable by the Dispatcher / Pinger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StanzaCondition {
    Wait,
    ItemNotFound,
    UnexpectedRequest,
    RemoteServerNotFound,
    /// Any other `modify`/`cancel`-class condition: treated as permanent.
    Other(String),
}

impl StanzaCondition {
    pub fn is_temporary(&self) -> bool {
        matches!(self, StanzaCondition::Wait)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StanzaError {
    pub condition: StanzaCondition,
    pub text: Option<String>,
}

/// Result of a single outbound pub/sub request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PubSubOutcome {
    Ok,
    Error(StanzaError),
    Timeout,
}

/// Inbound items-received event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ItemsEvent {
    pub sender_service: String,
    pub recipient: String,
    pub node: String,
    pub items: Vec<Element>,
}

/// Default per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
