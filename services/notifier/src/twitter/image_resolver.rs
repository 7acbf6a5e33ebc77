//! The HTTP/oEmbed side of the image-URL extractor. The
//! pattern dispatch and `augmentStatusWithImage` algorithm live in
//! `ikd_core::image`; this is the one resolver kind ([`ResolverKind::OEmbed`])
//! that actually reaches the network.

use async_trait::async_trait;
use ikd_core::image::{ImageResolver, ResolverKind};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
}

/// Fetches the oEmbed document for a URL and returns its `url` field iff
/// `type == "photo"`. Every failure mode — network error, non-2xx, bad
/// JSON, wrong type, missing `url` — collapses to `None`; image
/// resolution errors never propagate.
pub struct OEmbedImageResolver {
    client: reqwest::Client,
    embedly_key: Option<String>,
}

impl OEmbedImageResolver {
    pub fn new(client: reqwest::Client, embedly_key: Option<String>) -> Self {
        OEmbedImageResolver { client, embedly_key }
    }

    fn endpoint_for(&self, url: &str) -> &'static str {
        if url.contains("flickr.com") {
            "https://www.flickr.com/services/oembed/"
        } else if url.contains("mobypicture.com") || url.contains("moby.to") {
            "http://api.mobypicture.com/oEmbed"
        } else if url.contains("instagram.com") {
            "https://api.instagram.com/oembed"
        } else {
            "https://api.embed.ly/1/oembed"
        }
    }
}

#[async_trait]
impl ImageResolver for OEmbedImageResolver {
    async fn resolve(&self, url: &str, _kind: ResolverKind) -> Option<String> {
        let endpoint = self.endpoint_for(url);
        let mut request = self.client.get(endpoint).query(&[("format", "json"), ("url", url)]);
        if endpoint.contains("embed.ly") {
            if let Some(key) = &self.embedly_key {
                request = request.query(&[("key", key.as_str())]);
            }
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(?err, url, "image resolver: oembed request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), url, "image resolver: oembed returned an error status");
            return None;
        }

        let body: OEmbedResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(?err, url, "image resolver: oembed returned unparsable json");
                return None;
            }
        };

        if body.kind == "photo" {
            body.url
        } else {
            None
        }
    }
}
