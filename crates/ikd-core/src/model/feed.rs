//! `Feed`: a named collection of sources sharing a handle and language.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    En,
    Nl,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Nl => "nl",
        }
    }
}

/// Identifies which aggregator kind a feed's notifications are routed to.
/// The concrete [`Aggregator`](crate) implementations live in
/// `services/notifier`, a service-level fan-out concern; this is
/// just the durable reference the registry stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatorRef {
    Logging,
    PubSub { service: String },
    LivePage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub handle: String,
    pub title: String,
    pub language: Language,
    pub aggregator_ref: AggregatorRef,
}

impl Feed {
    /// Canonical URI, e.g. `xmpp:feeds.mediamatic.nl?node=funfair`.
    pub fn uri(&self) -> String {
        format!("xmpp:feeds.mediamatic.nl?node={}", self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_uri_embeds_handle() {
        let feed = Feed {
            id: 1,
            handle: "funfair".to_owned(),
            title: "Funfair".to_owned(),
            language: Language::En,
            aggregator_ref: AggregatorRef::Logging,
        };
        assert_eq!(feed.uri(), "xmpp:feeds.mediamatic.nl?node=funfair");
    }
}
