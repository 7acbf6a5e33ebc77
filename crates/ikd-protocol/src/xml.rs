//! A small typed-accessor library over parsed XML payloads.
//!
//! The generic XML wire parser itself is a peripheral/external
//! component — by the time a payload reaches a [`Source`] formatter it
//! has already been turned into an [`Element`] tree by that boundary. This
//! module defines that tree plus the handful of accessors
//! ("a small library of typed accessors `payload.child("verb").elements()`")
//! that the formatter library is built against, and a thin
//! `quick-xml`-backed constructor used to materialize payloads in tests and
//! at the fabric boundary.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// First child with a matching local name, ignoring any namespace prefix.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    /// All children with a matching local name.
    pub fn elements(&self, name: &str) -> impl Iterator<Item = &Element> {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Direct text content, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Parse a UTF-8 XML document into an [`Element`] tree. Only the subset
    /// needed by this system's payloads is supported: elements, attributes,
    /// and text content (no CDATA/processing instructions/comments carried
    /// through — they are skipped).
    pub fn parse(xml: &str) -> Result<Element, XmlParseError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(|e| XmlParseError(e.to_string()))? {
                Event::Start(tag) => {
                    let mut el = Element::new(decode(tag.name().as_ref()));
                    for attr in tag.attributes().flatten() {
                        let key = decode(attr.key.as_ref());
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.into_owned())
                            .unwrap_or_default();
                        el.attrs.insert(key, value);
                    }
                    stack.push(el);
                }
                Event::Empty(tag) => {
                    let mut el = Element::new(decode(tag.name().as_ref()));
                    for attr in tag.attributes().flatten() {
                        let key = decode(attr.key.as_ref());
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.into_owned())
                            .unwrap_or_default();
                        el.attrs.insert(key, value);
                    }
                    push_finished(&mut stack, &mut root, el);
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| XmlParseError(e.to_string()))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Event::End(_) => {
                    if let Some(el) = stack.pop() {
                        push_finished(&mut stack, &mut root, el);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        root.ok_or_else(|| XmlParseError("empty document".to_owned()))
    }
}

fn push_finished(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("XML parse error: {0}")]
pub struct XmlParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let el = Element::parse(
            r#"<rsp><vote><answer_id_ref>160252</answer_id_ref></vote><person><title>Fred Pook</title></person></rsp>"#,
        )
        .unwrap();
        assert_eq!(el.local_name(), "rsp");
        assert_eq!(
            el.child("vote")
                .and_then(|v| v.child("answer_id_ref"))
                .map(Element::text),
            Some("160252")
        );
        assert_eq!(
            el.child("person").and_then(|p| p.child("title")).map(Element::text),
            Some("Fred Pook")
        );
    }

    #[test]
    fn strips_namespace_prefix_for_local_name_lookup() {
        let el = Element::parse(r#"<ns:root xmlns:ns="urn:x"><ns:child>hi</ns:child></ns:root>"#).unwrap();
        assert_eq!(el.child("child").map(Element::text), Some("hi"));
    }
}
