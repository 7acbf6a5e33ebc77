//! Image-URL extractor: pattern-dispatched enrichment of a status with a
//! canonical `image_url`.
//!
//! The oEmbed/HTTP fetch itself is a boundary concern (it lives in
//! `services/notifier`'s resolver, injected here through
//! [`ImageResolver`]); this module owns the pure pattern-dispatch table and
//! the `augmentStatusWithImage` algorithm.

use async_trait::async_trait;
use ikd_protocol::Status;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    Literal,
    Twitpic,
    OEmbed,
}

struct Pattern {
    regex: &'static str,
    kind: ResolverKind,
}

/// Static ordered list: first matching pattern wins.
const PATTERNS: &[Pattern] = &[
    Pattern { regex: r"(?i)^https?://twitpic\.com/([a-z0-9]+)$", kind: ResolverKind::Twitpic },
    Pattern { regex: r"(?i)^https?://i\d+\.tinypic\.com/.+\.(png|jpg)$", kind: ResolverKind::Literal },
    Pattern { regex: r"(?i)^https?://moby\.to/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://(www\.)?mobypicture\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://(www\.)?flickr\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://(www\.)?instagram\.com/", kind: ResolverKind::OEmbed },
    // embed.ly-proxied hosts
    Pattern { regex: r"(?i)^https?://tweetphoto\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://twitgoo\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://pikchur\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://imgur\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://post\.ly/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://img\.ly/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://plixi\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://path\.com/p/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)^https?://yfrog\.com/", kind: ResolverKind::OEmbed },
    Pattern { regex: r"(?i)\.(jpe?g|png|gif)(\?.*)?$", kind: ResolverKind::Literal },
];

fn compiled() -> &'static [(Regex, ResolverKind)] {
    static CELL: OnceLock<Vec<(Regex, ResolverKind)>> = OnceLock::new();
    CELL.get_or_init(|| {
        PATTERNS.iter().map(|p| (Regex::new(p.regex).expect("static pattern is valid"), p.kind)).collect()
    })
}

/// The resolver kind a URL dispatches to, or `None` if nothing matches.
pub fn resolver_for(url: &str) -> Option<ResolverKind> {
    compiled().iter().find(|(re, _)| re.is_match(url)).map(|(_, kind)| *kind)
}

/// twitpic's mechanical show/large rewrite, e.g.
/// `http://twitpic.com/3dhy78` -> `http://twitpic.com/show/large/3dhy78`.
pub fn twitpic_rewrite(url: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^(https?://twitpic\.com/)([a-z0-9]+)$").unwrap());
    let caps = re.captures(url)?;
    Some(format!("{}show/large/{}", &caps[1], &caps[2]))
}

/// An injected HTTP/oEmbed resolver; `services/notifier` provides the real
/// `reqwest`-backed implementation, tests provide a scripted stub.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Resolve a single candidate URL to a canonical image URL, per its
    /// dispatched [`ResolverKind`]. Any failure returns `Ok(None)` — errors
    /// never propagate out of image resolution.
    async fn resolve(&self, url: &str, kind: ResolverKind) -> Option<String>;
}

fn prefixed_with_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_owned()
    } else {
        format!("http://{url}")
    }
}

/// `augmentStatusWithImage`. Sets `status.image_url` in place.
pub async fn augment_status_with_image(status: &mut Status, resolver: &dyn ImageResolver) {
    if let Some(media) = status.entities.media.first() {
        status.image_url = Some(media.media_url.clone());
        return;
    }

    let mut candidates = Vec::new();
    for url_entity in &status.entities.urls {
        let raw = url_entity.expanded_url.as_deref().unwrap_or(&url_entity.url);
        candidates.push(prefixed_with_scheme(raw));
    }
    if candidates.is_empty() {
        status.image_url = None;
        return;
    }

    let futures = candidates.iter().filter_map(|url| resolver_for(url).map(|kind| resolve_one(resolver, url, kind)));
    let results = futures::future::join_all(futures).await;
    status.image_url = results.into_iter().flatten().next();
}

async fn resolve_one(resolver: &dyn ImageResolver, url: &str, kind: ResolverKind) -> Option<String> {
    match kind {
        ResolverKind::Twitpic => twitpic_rewrite(url).or_else(|| Some(url.to_owned())),
        ResolverKind::Literal => Some(url.to_owned()),
        ResolverKind::OEmbed => resolver.resolve(url, kind).await,
    }
}
