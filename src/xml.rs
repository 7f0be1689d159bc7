//! Small helpers shared by the quick-xml based parsers.

extern crate alloc;

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesRef, BytesStart, BytesText};
use quick_xml::reader::Reader;

use crate::error::EpubError;

/// Build a reader configured for the loosely-formed documents found in EPUBs.
pub(crate) fn lenient_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    let config = reader.config_mut();
    config.trim_text(false);
    config.expand_empty_elements = false;
    config.check_end_names = false;
    reader
}

/// Local (namespace-stripped) element name, e.g. `dc:title` -> `title`.
pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Local name of a closing tag.
pub(crate) fn local_end_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// All attributes of an element as (qualified name, unescaped value) pairs.
pub(crate) fn attrs(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = reader.decoder().decode(attr.key.as_ref()).ok()?.into_owned();
            let raw = reader.decoder().decode(&attr.value).ok()?;
            let value = match unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.into_owned(),
            };
            Some((key, value))
        })
        .collect()
}

/// Look up an attribute by its qualified name, falling back to its local name.
///
/// Values are entity-unescaped. Malformed attributes are skipped.
pub(crate) fn attr(e: &BytesStart<'_>, reader: &Reader<&[u8]>, name: &str) -> Option<String> {
    let mut local_match = None;
    for attr in e.attributes().flatten() {
        let Ok(key) = reader.decoder().decode(attr.key.as_ref()) else {
            continue;
        };
        let Ok(raw) = reader.decoder().decode(&attr.value) else {
            continue;
        };
        let value = match unescape(&raw) {
            Ok(value) => value.into_owned(),
            Err(_) => raw.into_owned(),
        };
        if key == name {
            return Some(value);
        }
        if local_match.is_none() && key.rsplit_once(':').is_some_and(|(_, local)| local == name) {
            local_match = Some(value);
        }
    }
    local_match
}

/// Decode a text event into an owned string.
pub(crate) fn text(e: &BytesText<'_>) -> Result<String, EpubError> {
    e.decode()
        .map(Cow::into_owned)
        .map_err(|err| EpubError::Parse(format!("Decode error: {:?}", err)))
}

/// Resolve an entity reference (`&amp;`, `&#8220;`, `&nbsp;`).
///
/// Unknown named entities are kept verbatim.
pub(crate) fn general_ref(e: &BytesRef<'_>) -> String {
    let name = match e.decode() {
        Ok(name) => name.into_owned(),
        Err(_) => return String::new(),
    };
    let entity = format!("&{};", name);
    match unescape(&entity) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => match name.as_str() {
            "nbsp" => "\u{a0}".to_string(),
            "mdash" => "\u{2014}".to_string(),
            "ndash" => "\u{2013}".to_string(),
            "hellip" => "\u{2026}".to_string(),
            _ => entity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;

    fn first_start(xml: &str) -> (Reader<&[u8]>, BytesStart<'static>) {
        let mut reader = lenient_reader(xml.as_bytes());
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) | Event::Empty(e) => return (reader, e.into_owned()),
                Event::Eof => panic!("no element"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_attr_prefers_exact_name_then_local() {
        let (reader, e) = first_start(r#"<nav epub:type="toc" id="n"/>"#);
        assert_eq!(attr(&e, &reader, "epub:type").as_deref(), Some("toc"));
        assert_eq!(attr(&e, &reader, "type").as_deref(), Some("toc"));
        assert_eq!(attr(&e, &reader, "id").as_deref(), Some("n"));
        assert_eq!(attr(&e, &reader, "class"), None);
    }

    #[test]
    fn test_attr_unescapes_entities() {
        let (reader, e) = first_start(r#"<a href="a.xhtml?x=1&amp;y=2"/>"#);
        assert_eq!(attr(&e, &reader, "href").as_deref(), Some("a.xhtml?x=1&y=2"));
    }

    #[test]
    fn test_local_names() {
        let (_, e) = first_start("<dc:title>x</dc:title>");
        assert_eq!(local_name(&e), "title");
        assert_eq!(local_end_name(b"opf:manifest"), "manifest");
        assert_eq!(local_end_name(b"spine"), "spine");
    }
}
