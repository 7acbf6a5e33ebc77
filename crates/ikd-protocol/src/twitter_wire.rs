//! JSON shapes for the microblog streaming API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Status {
    pub user: StatusUser,
    pub text: String,
    #[serde(default)]
    pub entities: Entities,
    /// Set by the image-URL extractor once resolved; absent on the
    /// wire, present after enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatusUser {
    pub id: u64,
    pub screen_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Entities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub media: Vec<MediaEntity>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UrlEntity {
    pub url: String,
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    pub indices: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaEntity {
    pub media_url: String,
    pub indices: (u32, u32),
}

/// The filter arguments sent to the streaming endpoint. Absent keys MUST
/// NOT be sent — enforced by `StreamFilterArgs::query_pairs` only
/// emitting non-empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFilterArgs {
    pub track: String,
    pub follow: String,
}

impl StreamFilterArgs {
    pub fn is_empty(&self) -> bool {
        self.track.is_empty() && self.follow.is_empty()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if !self.track.is_empty() {
            pairs.push(("track", self.track.as_str()));
        }
        if !self.follow.is_empty() {
            pairs.push(("follow", self.follow.as_str()));
        }
        pairs
    }
}
