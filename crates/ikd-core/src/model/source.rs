//! `Source`: the tagged variant replacing the original's mixin
//! inheritance. Each variant knows its pub/sub node
//! address; formatting behavior lives in [`crate::formatter`] so the data
//! shape here stays small and the formatter library can be tested against
//! plain values.

use super::thing::{Site, Thing};
use ikd_protocol::pubsub_host_of;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCommon {
    pub id: i64,
    pub feed_id: i64,
    pub enabled: bool,
    /// Per-source override of the `meta` "via" attribution.
    pub via: Option<String>,
    pub subscription_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Vote {
        question: Thing,
        template: Option<String>,
    },
    Presence {
        question: Thing,
    },
    IkMic {
        question: Thing,
    },
    Status {
        site: Site,
        event: Option<Thing>,
        user: Option<Thing>,
    },
    RegDesk {
        event: Thing,
    },
    Race {
        race: Thing,
    },
    IkCam {
        event: Option<Thing>,
        creator: Option<Thing>,
    },
    ActivityStream {
        site: Site,
        actor: Option<Thing>,
    },
    WoW {
        agent: Thing,
    },
    Checkins {
        site: Site,
    },
    Commits {
        service: String,
        node_identifier: String,
    },
    Twitter {
        terms: Vec<String>,
        user_ids: Vec<String>,
    },
    Simple {
        service: String,
        node_identifier: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub common: SourceCommon,
    pub kind: SourceKind,
}

impl Source {
    /// The `(service-host, node)` this source wants to listen on, or `None`
    /// when it isn't pub/sub-backed (Twitter) or its reference Things are
    /// unset / malformed.
    pub fn node_address(&self) -> Option<(String, String)> {
        match &self.kind {
            SourceKind::Vote { question, .. }
            | SourceKind::Presence { question }
            | SourceKind::IkMic { question } => {
                let host = pubsub_host_of(&question.uri)?;
                let id = question.id()?;
                Some((host, format!("vote/{id}")))
            }
            SourceKind::Status { site, .. } => {
                let host = pubsub_host_of(&site.uri)?;
                Some((host, "status".to_owned()))
            }
            SourceKind::RegDesk { event } => {
                let host = pubsub_host_of(&event.uri)?;
                let id = event.id()?;
                Some((host, format!("regdesk/by_event/{id}")))
            }
            SourceKind::Race { race } => {
                let host = pubsub_host_of(&race.uri)?;
                let id = race.id()?;
                Some((host, format!("race/{id}")))
            }
            SourceKind::IkCam { event, creator } => {
                let (host, node) = match (creator, event) {
                    (Some(creator), _) => (
                        ikd_protocol::host_of(&creator.uri)?,
                        format!("ikcam/{}", creator.id()?),
                    ),
                    (None, Some(event)) => (
                        ikd_protocol::host_of(&event.uri)?,
                        format!("ikcam/by_event/{}", event.id()?),
                    ),
                    (None, None) => return None,
                };
                Some((host, node))
            }
            SourceKind::ActivityStream { site, .. } | SourceKind::Checkins { site } => {
                let host = pubsub_host_of(&site.uri)?;
                Some((host, "activity".to_owned()))
            }
            SourceKind::WoW { agent } => {
                let host = pubsub_host_of(&agent.uri)?;
                Some((host, "activity".to_owned()))
            }
            SourceKind::Commits {
                service,
                node_identifier,
            }
            | SourceKind::Simple {
                service,
                node_identifier,
            } => Some((service.clone(), node_identifier.clone())),
            SourceKind::Twitter { .. } => None,
        }
    }

    /// A source is subscribable only when it has a defined node address and
    /// is enabled.
    pub fn is_subscribable(&self) -> bool {
        self.common.enabled && self.node_address().is_some()
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            SourceKind::Vote { .. } => "vote",
            SourceKind::Presence { .. } => "presence",
            SourceKind::IkMic { .. } => "ikmic",
            SourceKind::Status { .. } => "status",
            SourceKind::RegDesk { .. } => "regdesk",
            SourceKind::Race { .. } => "race",
            SourceKind::IkCam { .. } => "ikcam",
            SourceKind::ActivityStream { .. } => "activity_stream",
            SourceKind::WoW { .. } => "wow",
            SourceKind::Checkins { .. } => "checkins",
            SourceKind::Commits { .. } => "commits",
            SourceKind::Twitter { .. } => "twitter",
            SourceKind::Simple { .. } => "simple",
        }
    }
}
