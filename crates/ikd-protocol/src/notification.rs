//! The `Notification` wire shape and its `<notification>` XML encoding.

use crate::xml::Element;
use std::collections::BTreeMap;

pub const NOTIFICATION_NS: &str = "http://mediamatic.nl/ns/ikdisplay/2009/notification";

/// Keys a formatter is expected to use; any other key is still carried
/// through untouched (the map is open, per the data model).
pub const RECOGNIZED_KEYS: &[&str] = &[
    "title", "subtitle", "icon", "picture", "meta", "via", "html", "link", "uri",
];

/// A small, open string-keyed map emitted for display or republish.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Notification(BTreeMap<String, String>);

impl Notification {
    pub fn new() -> Self {
        Notification(BTreeMap::new())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// An emitted notification must carry at least `title` or `subtitle`.
    pub fn is_displayable(&self) -> bool {
        self.0.contains_key("title") || self.0.contains_key("subtitle")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as a `<notification xmlns="...">` element, one child per key.
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("notification").with_attr("xmlns", NOTIFICATION_NS);
        for (key, value) in &self.0 {
            el = el.with_child(Element::new(key.clone()).with_text(value.clone()));
        }
        el
    }

    /// Decode from a `<notification>` element; each child element becomes a
    /// key/value pair keyed by its local name.
    pub fn from_element(el: &Element) -> Notification {
        let mut map = BTreeMap::new();
        for child in &el.children {
            map.insert(child.local_name().to_owned(), child.text().to_owned());
        }
        Notification(map)
    }

    pub fn to_xml_string(&self) -> String {
        let el = self.to_element();
        render(&el)
    }
}

fn render(el: &Element) -> String {
    let mut out = String::new();
    render_into(el, &mut out);
    out
}

fn render_into(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if el.children.is_empty() && el.text.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    out.push_str(&escape(&el.text));
    for child in &el.children {
        render_into(child, out);
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
