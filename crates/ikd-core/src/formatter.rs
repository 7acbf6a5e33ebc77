//! Payload → [`Notification`] mapping for every [`SourceKind`].
//!
//! Each pub/sub-backed variant gets its own `format_*` function taking the
//! already-parsed payload [`Element`]; [`format`] dispatches on a [`Source`]'s
//! kind. The Twitter formatter is separate ([`format_twitter`]) since it
//! works off a [`Status`] rather than an XML payload.

use crate::model::{Language, Source, SourceKind};
use crate::texts;
use ikd_protocol::{Element, Notification, Status};
use rand::seq::SliceRandom;

fn via_value(source: &Source, site_title: Option<&str>) -> Option<String> {
    if let Some(v) = &source.common.via {
        return Some(v.clone());
    }
    if let Some(v) = texts::default_via(source.kind_name()) {
        return Some(v.to_owned());
    }
    site_title.map(str::to_owned)
}

fn set_meta(n: &mut Notification, via: Option<String>) {
    if let Some(v) = via {
        n.set("meta", format!("via {v}"));
    }
}

fn person_title_or_alien(payload: &Element, lang: Language) -> String {
    let title = payload
        .child("person")
        .and_then(|p| p.child("title"))
        .map(Element::text)
        .unwrap_or_default();
    if title.is_empty() {
        texts::alien(lang).to_owned()
    } else {
        title.to_owned()
    }
}

fn person_image(payload: &Element) -> Option<String> {
    payload
        .child("person")
        .and_then(|p| p.child("image"))
        .map(Element::text)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Top-level dispatch for pub/sub-backed sources. `Twitter` has no
/// `Element` payload and is handled by [`format_twitter`] instead.
pub fn format(source: &Source, lang: Language, payload: &Element) -> Option<Notification> {
    let via_site = |site_title: &str| via_value(source, Some(site_title));
    match &source.kind {
        SourceKind::Vote { template, .. } => {
            format_vote(template.as_deref(), payload, lang, via_value(source, None))
        }
        SourceKind::Presence { .. } => format_presence(payload, lang, via_value(source, None)),
        SourceKind::IkMic { .. } => format_ikmic(payload, lang, via_value(source, None)),
        SourceKind::Status { site, .. } => format_status(payload, via_site(&site.title)),
        SourceKind::RegDesk { .. } => format_regdesk(payload, lang, via_value(source, None)),
        SourceKind::Race { .. } => format_race(payload, lang, via_value(source, None)),
        SourceKind::IkCam { event, creator } => {
            format_ikcam(creator.as_ref(), event.as_ref(), payload, lang, via_value(source, None))
        }
        SourceKind::ActivityStream { site, .. } => {
            format_activity_stream(payload, lang, via_site(&site.title))
        }
        SourceKind::WoW { agent } => format_wow(&agent.uri, payload, lang, via_value(source, None)),
        SourceKind::Checkins { site } => format_checkins(payload, lang, via_site(&site.title)),
        SourceKind::Commits { .. } => format_commits(payload, lang, via_value(source, None)),
        SourceKind::Simple { .. } => format_simple(payload),
        SourceKind::Twitter { .. } => None,
    }
}

/// Vote formatter: the base case the other pub/sub formatters vary from.
pub fn format_vote(
    template: Option<&str>,
    payload: &Element,
    lang: Language,
    via: Option<String>,
) -> Option<Notification> {
    let title = person_title_or_alien(payload, lang);
    let answer_id_ref = payload.child("vote").and_then(|v| v.child("answer_id_ref")).map(Element::text)?;
    let answer = payload
        .child("question")
        .and_then(|q| q.child("answers"))
        .into_iter()
        .flat_map(|a| a.elements("item"))
        .find(|item| item.child("answer_id").map(Element::text) == Some(answer_id_ref))?;
    let answer_title = answer.child("title").map(Element::text).unwrap_or_default();
    let template = template.unwrap_or_else(|| texts::voted_template(lang));
    let subtitle = template.replace("%s", answer_title);

    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    if let Some(icon) = person_image(payload) {
        n.set("icon", icon);
    }
    set_meta(&mut n, via);
    n.is_displayable().then_some(n)
}

/// Presence override: subtitle is a fixed localized line.
pub fn format_presence(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let person_title = payload.child("person").and_then(|p| p.child("title")).map(Element::text).unwrap_or_default();
    let (title, subtitle) = if person_title.is_empty() {
        (texts::alien(lang).to_owned(), texts::alien_present(lang).to_owned())
    } else {
        (person_title.to_owned(), texts::present(lang).to_owned())
    };
    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    if let Some(icon) = person_image(payload) {
        n.set("icon", icon);
    }
    set_meta(&mut n, via);
    Some(n)
}

/// IkMic override: subtitle is `random.choice` of a localized interrupt line.
pub fn format_ikmic(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let title = person_title_or_alien(payload, lang);
    let subtitle = texts::interrupt_lines(lang)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("interrupts");
    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    if let Some(icon) = person_image(payload) {
        n.set("icon", icon);
    }
    set_meta(&mut n, via);
    Some(n)
}

/// Status formatter. Drops on empty body or the literal "is".
pub fn format_status(payload: &Element, via: Option<String>) -> Option<Notification> {
    let body = payload.child("status").map(Element::text).unwrap_or_default();
    if body.is_empty() || body == "is" {
        return None;
    }
    let title = payload.child("person").and_then(|p| p.child("title")).map(Element::text).unwrap_or_default();
    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", body);
    if let Some(icon) = person_image(payload) {
        n.set("icon", icon);
    }
    set_meta(&mut n, via);
    n.is_displayable().then_some(n)
}

/// RegDesk: check-in at the registration desk, following the Presence
/// shape with a fixed line.
pub fn format_regdesk(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let title = person_title_or_alien(payload, lang);
    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", texts::registered(lang));
    if let Some(icon) = person_image(payload) {
        n.set("icon", icon);
    }
    set_meta(&mut n, via);
    Some(n)
}

/// Race: finish-line style notification from `event`/`time` child text.
pub fn format_race(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let title = person_title_or_alien(payload, lang);
    let event = payload.child("event").map(Element::text).unwrap_or_default();
    let time = payload.child("time").map(Element::text).unwrap_or_default();
    if event.is_empty() && time.is_empty() {
        return None;
    }
    let subtitle = match (event.is_empty(), time.is_empty()) {
        (false, false) => format!("{event} ({time})"),
        (false, true) => event.to_owned(),
        (true, false) => time.to_owned(),
        (true, true) => unreachable!(),
    };
    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    set_meta(&mut n, via);
    Some(n)
}

/// Simple: a direct element map, no localization.
pub fn format_simple(payload: &Element) -> Option<Notification> {
    let mut n = Notification::new();
    if let Some(title) = payload.child("title").map(Element::text).filter(|s| !s.is_empty()) {
        n.set("title", title);
    }
    if let Some(subtitle) = payload.child("subtitle").map(Element::text).filter(|s| !s.is_empty()) {
        n.set("subtitle", subtitle);
    }
    if let Some(image) = payload.child("image").map(Element::text).filter(|s| !s.is_empty()) {
        n.set("icon", image);
    }
    n.is_displayable().then_some(n)
}

fn find_link<'a>(el: &'a Element, rel: &str) -> Option<&'a str> {
    el.elements("link").find(|l| l.attr("rel") == Some(rel)).and_then(|l| l.attr("href"))
}

/// `http://activitystrea.ms/schema/1.0/post` -> `post`.
fn verb_local_name(verb: &str) -> &str {
    verb.rsplit('/').next().unwrap_or(verb)
}

struct ActivityExtract {
    verb: String,
    actor_title: String,
    actor_figure: Option<String>,
    object_title: Option<String>,
    target_title: Option<String>,
    object_figure: Option<String>,
    object_is_attachment: bool,
    agent_id: Option<String>,
    author_names: Vec<String>,
}

fn extract_activity(payload: &Element, supported_verbs: &[&str]) -> Option<ActivityExtract> {
    let verbs: Vec<&str> = payload.elements("verb").map(|v| verb_local_name(v.text())).collect();
    let verb = supported_verbs.iter().find(|sv| verbs.contains(sv))?.to_string();

    let author = payload.child("author");
    let actor_title = author.and_then(|a| a.child("name")).map(Element::text).unwrap_or_default().to_owned();
    let actor_figure = author
        .and_then(|a| find_link(a, "figure"))
        .map(|href| format!("{href}?width=80&height=80&filter=crop"));

    let object = payload.child("object");
    let object_title = object.and_then(|o| o.child("title")).map(Element::text).map(str::to_owned);
    let target_title = payload.child("target").and_then(|t| t.child("title")).map(Element::text).map(str::to_owned);
    let object_is_attachment =
        object.and_then(|o| o.child("object-type")).map(Element::text) == Some("attachment");
    let object_figure = object.and_then(|o| find_link(o, "figure")).map(|href| format!("{href}?width=480"));

    let agent_id = payload.child("agent").and_then(|a| a.child("id")).map(Element::text).map(str::to_owned);
    let author_names: Vec<String> = payload
        .elements("author")
        .filter_map(|a| a.child("name"))
        .map(Element::text)
        .map(str::to_owned)
        .collect();

    Some(ActivityExtract {
        verb,
        actor_title,
        actor_figure,
        object_title,
        target_title,
        object_figure,
        object_is_attachment,
        agent_id,
        author_names,
    })
}

fn fill_template(template: &str, object: Option<&str>, target: Option<&str>) -> String {
    template
        .replace("%object%", object.unwrap_or(""))
        .replace("%target%", target.unwrap_or(""))
}

fn finish_activity(
    ex: ActivityExtract,
    lang: Language,
    via: Option<String>,
    agent_verbs: &[&str],
) -> Option<Notification> {
    let template = texts::activity_verb_template(&ex.verb, lang)?;
    if ex.agent_id.is_some() && !agent_verbs.contains(&ex.verb.as_str()) {
        return None;
    }
    let subtitle = fill_template(template, ex.object_title.as_deref(), ex.target_title.as_deref());
    let title = if ex.actor_title.is_empty() { texts::alien(lang).to_owned() } else { ex.actor_title };

    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    if let Some(icon) = ex.actor_figure {
        n.set("icon", icon);
    }
    if ex.object_is_attachment {
        if let Some(pic) = ex.object_figure {
            n.set("picture", pic);
        }
    }
    set_meta(&mut n, via);
    n.is_displayable().then_some(n)
}

const ACTIVITY_STREAM_VERBS: &[&str] = &["tag", "post", "like", "checkin", "commit"];
const ACTIVITY_STREAM_AGENT_VERBS: &[&str] = &["post", "like"];

pub fn format_activity_stream(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let ex = extract_activity(payload, ACTIVITY_STREAM_VERBS)?;
    finish_activity(ex, lang, via, ACTIVITY_STREAM_AGENT_VERBS)
}

/// WoW additionally requires `payload.agent.id == source.agent.uri`.
pub fn format_wow(agent_uri: &str, payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let ex = extract_activity(payload, &["post", "like"])?;
    if ex.agent_id.as_deref() != Some(agent_uri) {
        return None;
    }
    finish_activity(ex, lang, via, &["post", "like"])
}

pub fn format_checkins(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let ex = extract_activity(payload, &["checkin"])?;
    finish_activity(ex, lang, via, &[])
}

/// Commits extends the activity-stream engine with the commit verb plus
/// the first line of `object.message` appended to the subtitle.
pub fn format_commits(payload: &Element, lang: Language, via: Option<String>) -> Option<Notification> {
    let message_first_line = payload
        .child("object")
        .and_then(|o| o.child("message"))
        .map(Element::text)
        .and_then(|m| m.lines().next())
        .map(str::to_owned);

    let ex = extract_activity(payload, &["commit"])?;
    let mut n = finish_activity(ex, lang, via, &["commit"])?;
    if let Some(line) = message_first_line {
        if !line.is_empty() {
            let subtitle = format!("{}: {line}", n.get("subtitle").unwrap_or_default());
            n.set("subtitle", subtitle);
        }
    }
    Some(n)
}

/// IkCam: activity-stream flavored, verb `ikcam`, singular/plural by
/// author count, filtered to the source's own creator/event reference.
pub fn format_ikcam(
    creator: Option<&crate::model::Thing>,
    event: Option<&crate::model::Thing>,
    payload: &Element,
    lang: Language,
    via: Option<String>,
) -> Option<Notification> {
    let ex = extract_activity(payload, &["ikcam"])?;
    if let Some(creator) = creator {
        if ex.agent_id.as_deref() != Some(creator.uri.as_str()) {
            return None;
        }
    } else if let Some(event) = event {
        if ex.target_title.as_deref() != Some(event.title.as_str()) {
            return None;
        }
    }

    let verb = if ex.author_names.len() <= 1 { "ikcam_one" } else { "ikcam_many" };
    let template = texts::activity_verb_template(verb, lang)?;
    let mut subtitle = template.to_owned();
    if let Some(target) = &ex.target_title {
        subtitle.push_str(&format!(" at {target}"));
    }
    let title = if ex.author_names.is_empty() {
        texts::alien(lang).to_owned()
    } else {
        ex.author_names.join(", ")
    };

    let mut n = Notification::new();
    n.set("title", title);
    n.set("subtitle", subtitle);
    if let Some(pic) = ex.object_figure {
        n.set("picture", pic);
    }
    set_meta(&mut n, via);
    n.is_displayable().then_some(n)
}

fn term_matches(term: &str, text: &str) -> bool {
    let t = term.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        let phrase = &t[1..t.len() - 1];
        return text.to_lowercase().contains(&phrase.to_lowercase());
    }
    let words: Vec<&str> = t.split_whitespace().collect();
    match words.as_slice() {
        [] => false,
        [single] => text.to_lowercase().contains(&single.to_lowercase()),
        [a, b] => {
            let pattern = format!(
                "(?is){}.*{}|{}.*{}",
                regex::escape(a),
                regex::escape(b),
                regex::escape(b),
                regex::escape(a)
            );
            regex::Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
        }
        many => {
            let lower = text.to_lowercase();
            many.iter().all(|w| lower.contains(&w.to_lowercase()))
        }
    }
}

/// `true` iff `terms`/`userIDs` match `status`.
pub fn twitter_matches(terms: &[String], user_ids: &[String], status: &Status) -> bool {
    if terms.is_empty() && user_ids.is_empty() {
        return true;
    }
    let uid = status.user.id.to_string();
    if user_ids.iter().any(|id| id == &uid) {
        return true;
    }
    terms.iter().any(|t| term_matches(t, &status.text))
}

/// Twitter formatter: rewrites URL entities in reverse-index order so
/// earlier indices stay valid, emitting a parallel `html` field.
pub fn format_twitter(terms: &[String], user_ids: &[String], status: &Status) -> Option<Notification> {
    if !twitter_matches(terms, user_ids, status) {
        return None;
    }

    let mut subtitle = status.text.clone();
    let mut html = status.text.clone();
    let mut urls = status.entities.urls.clone();
    urls.sort_by(|a, b| b.indices.0.cmp(&a.indices.0));
    for u in &urls {
        let display = u.display_url.as_deref().or(u.expanded_url.as_deref()).unwrap_or(&u.url);
        subtitle = subtitle.replacen(&u.url, display, 1);
        let anchor = format!("<a href='{}'>{display}</a>", u.url);
        html = html.replacen(&u.url, &anchor, 1);
    }

    let mut n = Notification::new();
    n.set("title", &status.user.screen_name);
    n.set("subtitle", subtitle);
    if !urls.is_empty() {
        n.set("html", html);
    }
    if let Some(image) = &status.image_url {
        n.set("picture", image.clone());
    }
    n.is_displayable().then_some(n)
}
