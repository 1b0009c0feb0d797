//! Recursive XML to mapping transform used for SOAP responses.
//!
//! Each child element of the root becomes an entry keyed by its namespaced
//! tag (`{namespace}localName`, or just `localName` when unqualified). Leaf
//! elements map to their text, elements with children map to a nested
//! [`XmlMap`]. Attributes are dropped and a repeated tag keeps its last value.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use std::collections::BTreeMap;

/// Mapping produced by [`element_to_map`].
pub type XmlMap = BTreeMap<String, XmlValue>;

/// Value of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    /// Leaf element; `None` when it has no text.
    Text(Option<String>),
    /// Element with child elements.
    Map(XmlMap),
}

impl XmlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlValue::Text(text) => text.as_deref(),
            XmlValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&XmlMap> {
        match self {
            XmlValue::Map(map) => Some(map),
            XmlValue::Text(_) => None,
        }
    }
}

/// Malformed document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed XML: {0}")]
pub struct Error(pub String);

struct Frame {
    tag: String,
    children: XmlMap,
    text: Option<String>,
}

impl Frame {
    fn into_value(self) -> (String, XmlValue) {
        let value = if self.children.is_empty() {
            XmlValue::Text(self.text)
        } else {
            XmlValue::Map(self.children)
        };
        (self.tag, value)
    }
}

fn qualified_name(resolved: &ResolveResult<'_>, local: &[u8]) -> String {
    let local = String::from_utf8_lossy(local);
    match resolved {
        ResolveResult::Bound(ns) => {
            format!("{{{}}}{}", String::from_utf8_lossy(ns.as_ref()), local)
        }
        _ => local.into_owned(),
    }
}

/// Parses `xml` and returns the mapping of the root element's children.
///
/// # Errors
///
/// Returns [`Error`] when the document is not well-formed or has no root.
///
/// # Example
///
/// ```
/// use salesforce_rest::xml::{element_to_map, XmlValue};
///
/// let map = element_to_map(r#"<a xmlns="urn:x"><b>1</b><c><d/></c></a>"#).unwrap();
/// assert_eq!(map["{urn:x}b"], XmlValue::Text(Some("1".to_string())));
/// assert!(map["{urn:x}c"].as_map().is_some());
/// ```
pub fn element_to_map(xml: &str) -> Result<XmlMap, Error> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<XmlMap> = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| Error(e.to_string()))?;
        match event {
            Event::Start(start) => {
                stack.push(Frame {
                    tag: qualified_name(&resolved, start.local_name().as_ref()),
                    children: XmlMap::new(),
                    text: None,
                });
            }
            Event::Empty(start) => {
                let tag = qualified_name(&resolved, start.local_name().as_ref());
                match stack.last_mut() {
                    Some(parent) => {
                        parent.children.insert(tag, XmlValue::Text(None));
                    }
                    None => root = Some(XmlMap::new()),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| Error(e.to_string()))?;
                append_text(stack.last_mut(), &text);
            }
            Event::CData(data) => {
                append_text(stack.last_mut(), &String::from_utf8_lossy(&data));
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| Error("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => {
                        let (tag, value) = frame.into_value();
                        parent.children.insert(tag, value);
                    }
                    None => root = Some(frame.children),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| Error("document has no root element".to_string()))
}

/// Text before the first child element is the element text.
fn append_text(frame: Option<&mut Frame>, text: &str) {
    if let Some(frame) = frame {
        if frame.children.is_empty() {
            frame.text.get_or_insert_with(String::new).push_str(text);
        }
    }
}

/// Follows `path` through nested maps and returns the leaf text.
pub fn text_at<'a>(map: &'a XmlMap, path: &[&str]) -> Option<&'a str> {
    let (last, parents) = path.split_last()?;
    let mut current = map;
    for key in parents {
        current = current.get(*key)?.as_map()?;
    }
    current.get(*last)?.as_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:enterprise.soap.sforce.com" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soapenv:Body>
    <loginResponse>
      <result>
        <metadataServerUrl>https://na1.salesforce.com/services/Soap/m/37.0/00D</metadataServerUrl>
        <passwordExpired>false</passwordExpired>
        <sandbox>false</sandbox>
        <serverUrl>https://na1.salesforce.com/services/Soap/c/37.0/00D</serverUrl>
        <sessionId>00D!session</sessionId>
        <userId>005xx</userId>
        <userInfo><currencySymbol xsi:nil="true"/><userName>user@example.com</userName></userInfo>
      </result>
    </loginResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

    const BODY: &str = "{http://schemas.xmlsoap.org/soap/envelope/}Body";

    #[test]
    fn test_element_to_map_login_response() {
        let map = element_to_map(LOGIN_RESPONSE).unwrap();
        let session = text_at(
            &map,
            &[
                BODY,
                "{urn:enterprise.soap.sforce.com}loginResponse",
                "{urn:enterprise.soap.sforce.com}result",
                "{urn:enterprise.soap.sforce.com}sessionId",
            ],
        );
        assert_eq!(session, Some("00D!session"));
    }

    #[test]
    fn test_element_to_map_drops_attributes_and_keeps_empty_leaves() {
        let map = element_to_map(LOGIN_RESPONSE).unwrap();
        let result = map[BODY].as_map().unwrap()["{urn:enterprise.soap.sforce.com}loginResponse"]
            .as_map()
            .unwrap()["{urn:enterprise.soap.sforce.com}result"]
            .as_map()
            .unwrap();
        let user_info = result["{urn:enterprise.soap.sforce.com}userInfo"]
            .as_map()
            .unwrap();
        assert_eq!(
            user_info["{urn:enterprise.soap.sforce.com}currencySymbol"],
            XmlValue::Text(None)
        );
        assert_eq!(user_info.len(), 2);
    }

    #[test]
    fn test_element_to_map_is_deterministic_and_order_insensitive() {
        let first = element_to_map("<r><a>1</a><b>2</b></r>").unwrap();
        let again = element_to_map("<r><a>1</a><b>2</b></r>").unwrap();
        let swapped = element_to_map("<r><b>2</b><a>1</a></r>").unwrap();
        assert_eq!(first, again);
        assert_eq!(first, swapped);
    }

    #[test]
    fn test_element_to_map_unqualified_tags() {
        let map = element_to_map("<r><a attr=\"x\">1 &amp; 2</a></r>").unwrap();
        assert_eq!(map["a"], XmlValue::Text(Some("1 & 2".to_string())));
    }

    #[test]
    fn test_element_to_map_repeated_tag_keeps_last() {
        let map = element_to_map("<r><a>1</a><a>2</a></r>").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"].as_text(), Some("2"));
    }

    #[test]
    fn test_element_to_map_rejects_malformed() {
        assert!(element_to_map("<r><a></r>").is_err());
        assert!(element_to_map("not xml at all").is_err());
        assert!(element_to_map("<r><a>").is_err());
    }

    #[test]
    fn test_text_at_missing_path() {
        let map = element_to_map("<r><a>1</a></r>").unwrap();
        assert_eq!(text_at(&map, &["a", "b"]), None);
        assert_eq!(text_at(&map, &[]), None);
    }
}
