//! Text property-list tree and its graft/prune operations
//!
//! A plist is read through the same XML reader as every other native file and
//! converted into a [`PlistValue`]. Edits address top-level keys of the root
//! dictionary.

use crate::errors::TreeError;
use crate::xml::{Element, XmlDocument};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use std::io::Write;
use tracing::debug;

const PLIST_DOCTYPE: &str =
    r#"plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

pub type PlistDict = IndexMap<String, PlistValue>;

/// A node of a property list
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// ISO-8601 timestamp, kept verbatim
    Date(String),
    /// Base64 payload, kept verbatim without whitespace
    Data(String),
    Array(Vec<PlistValue>),
    Dictionary(PlistDict),
}

impl PlistValue {
    /// Convert a `<string>`, `<dict>`, `<array>`, ... element
    pub fn from_element(element: &Element) -> Result<PlistValue, TreeError> {
        let text = element.text();
        let value = match element.tag.as_str() {
            "string" => PlistValue::String(text.clone()),
            "integer" => PlistValue::Integer(
                text.trim()
                    .parse()
                    .map_err(|_| TreeError::InvalidPlist(format!("bad integer '{}'", text.trim())))?,
            ),
            "real" => PlistValue::Real(
                text.trim()
                    .parse()
                    .map_err(|_| TreeError::InvalidPlist(format!("bad real '{}'", text.trim())))?,
            ),
            "true" => PlistValue::Boolean(true),
            "false" => PlistValue::Boolean(false),
            "date" => PlistValue::Date(text.trim().to_string()),
            "data" => PlistValue::Data(text.chars().filter(|c| !c.is_whitespace()).collect()),
            "array" => PlistValue::Array(
                element
                    .elements()
                    .map(PlistValue::from_element)
                    .collect::<Result<_, _>>()?,
            ),
            "dict" => PlistValue::Dictionary(dict_from_element(element)?),
            other => return Err(TreeError::InvalidPlist(format!("unexpected <{other}>"))),
        };
        Ok(value)
    }

    /// Parse a serialized fragment such as `<array><string>x</string></array>`
    pub fn from_fragment(xml: &str) -> Result<PlistValue, TreeError> {
        PlistValue::from_element(&Element::parse(xml)?)
    }

    pub fn as_dictionary(&self) -> Option<&PlistDict> {
        match self {
            PlistValue::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn dict_from_element(element: &Element) -> Result<PlistDict, TreeError> {
    let mut dict = PlistDict::new();
    let mut children = element.elements();
    while let Some(key) = children.next() {
        if key.tag != "key" {
            return Err(TreeError::InvalidPlist(format!(
                "expected <key> in <dict>, found <{}>",
                key.tag
            )));
        }
        let Some(value) = children.next() else {
            return Err(TreeError::InvalidPlist(format!(
                "key '{}' has no value",
                key.text_trimmed()
            )));
        };
        dict.insert(key.text_trimmed(), PlistValue::from_element(value)?);
    }
    Ok(dict)
}

/// A text plist document
#[derive(Debug, Clone, PartialEq)]
pub struct PlistDocument {
    pub root: PlistValue,
}

impl PlistDocument {
    pub fn parse(content: &str) -> Result<Self, TreeError> {
        let doc = XmlDocument::parse(content)?;
        if doc.root.tag != "plist" {
            return Err(TreeError::InvalidPlist(format!(
                "root element is <{}>, expected <plist>",
                doc.root.tag
            )));
        }
        let root = match doc.root.elements().next() {
            Some(el) => PlistValue::from_element(el)?,
            None => PlistValue::Dictionary(PlistDict::new()),
        };
        Ok(PlistDocument { root })
    }

    /// Serialize with the Apple DOCTYPE and tab indentation
    pub fn to_plist_string(&self) -> Result<String, TreeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::DocType(BytesText::from_escaped(PLIST_DOCTYPE)))?;
        let mut plist = BytesStart::new("plist");
        plist.push_attribute(("version", "1.0"));
        writer.write_event(Event::Start(plist))?;
        write_value(&mut writer, &self.root)?;
        writer.write_event(Event::End(BytesEnd::new("plist")))?;
        let mut out = String::from_utf8(writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }

    pub fn dict_mut(&mut self) -> Option<&mut PlistDict> {
        match &mut self.root {
            PlistValue::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<(), TreeError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    // An explicit text event keeps empty values on one line: <string></string>
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_value<W: Write>(writer: &mut Writer<W>, value: &PlistValue) -> Result<(), TreeError> {
    match value {
        PlistValue::String(s) => write_text_element(writer, "string", s)?,
        PlistValue::Integer(i) => write_text_element(writer, "integer", &i.to_string())?,
        PlistValue::Real(r) => write_text_element(writer, "real", &r.to_string())?,
        PlistValue::Boolean(b) => {
            writer.write_event(Event::Empty(BytesStart::new(if *b { "true" } else { "false" })))?;
        }
        PlistValue::Date(d) => write_text_element(writer, "date", d)?,
        PlistValue::Data(d) => write_text_element(writer, "data", d)?,
        PlistValue::Array(items) if items.is_empty() => {
            writer.write_event(Event::Empty(BytesStart::new("array")))?;
        }
        PlistValue::Array(items) => {
            writer.write_event(Event::Start(BytesStart::new("array")))?;
            for item in items {
                write_value(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("array")))?;
        }
        PlistValue::Dictionary(dict) if dict.is_empty() => {
            writer.write_event(Event::Empty(BytesStart::new("dict")))?;
        }
        PlistValue::Dictionary(dict) => {
            writer.write_event(Event::Start(BytesStart::new("dict")))?;
            for (key, item) in dict {
                write_text_element(writer, "key", key)?;
                write_value(writer, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new("dict")))?;
        }
    }
    Ok(())
}

/// Compare an existing value against a fragment pattern.
///
/// Strings in the pattern may contain `$(NAME)` placeholders that match any
/// text. Dictionaries and arrays match when every entry of the pattern
/// matches the entry at the same key or index.
pub fn node_equal(existing: &PlistValue, pattern: &PlistValue) -> bool {
    match (existing, pattern) {
        (PlistValue::String(value), PlistValue::String(pat)) => wildcard_match(value, pat),
        (PlistValue::Dictionary(value), PlistValue::Dictionary(pat)) => pat
            .iter()
            .all(|(key, p)| value.get(key).is_some_and(|v| node_equal(v, p))),
        (PlistValue::Array(value), PlistValue::Array(pat)) => pat
            .iter()
            .enumerate()
            .all(|(idx, p)| value.get(idx).is_some_and(|v| node_equal(v, p))),
        (PlistValue::Integer(_), PlistValue::Integer(_))
        | (PlistValue::Real(_), PlistValue::Real(_))
        | (PlistValue::Boolean(_), PlistValue::Boolean(_))
        | (PlistValue::Date(_), PlistValue::Date(_))
        | (PlistValue::Data(_), PlistValue::Data(_)) => existing == pattern,
        _ => false,
    }
}

fn wildcard_match(value: &str, pattern: &str) -> bool {
    if !pattern.contains("$(") {
        return value == pattern;
    }
    let escaped = regex::escape(pattern);
    let Ok(placeholder) = Regex::new(r"\\\$\\\(\S+?\\\)") else {
        return value == pattern;
    };
    let source = format!("^{}$", placeholder.replace_all(&escaped, "(.*?)"));
    Regex::new(&source).is_ok_and(|re| re.is_match(value))
}

/// Insert `fragment` under `key` of the root dictionary.
///
/// Arrays are concatenated and de-duplicated, two dictionaries are merged
/// with existing keys winning, anything else replaces the current value.
pub fn graft_plist(doc: &mut PlistDict, fragment: &PlistValue, key: &str) -> bool {
    let merged = match (doc.get(key), fragment) {
        (Some(PlistValue::Array(existing)), PlistValue::Array(added)) => {
            let mut items: Vec<PlistValue> = Vec::with_capacity(existing.len() + added.len());
            for item in existing.iter().chain(added) {
                if !items.iter().any(|kept| node_equal(kept, item)) {
                    items.push(item.clone());
                }
            }
            PlistValue::Array(items)
        }
        (Some(PlistValue::Dictionary(existing)), PlistValue::Dictionary(added)) => {
            let mut dict = added.clone();
            for (k, v) in existing {
                dict.insert(k.clone(), v.clone());
            }
            PlistValue::Dictionary(dict)
        }
        _ => fragment.clone(),
    };
    debug!("Grafting plist key {}", key);
    doc.insert(key.to_string(), merged);
    true
}

/// Remove `fragment` from `key` of the root dictionary.
///
/// Array fragments drop each matching entry and the key goes away once the
/// array is empty; other fragments drop the key when its value matches.
pub fn prune_plist(doc: &mut PlistDict, fragment: &PlistValue, key: &str) -> bool {
    match (doc.get_mut(key), fragment) {
        (Some(PlistValue::Array(existing)), PlistValue::Array(removed)) => {
            for pattern in removed {
                existing.retain(|item| !node_equal(item, pattern));
            }
            if existing.is_empty() {
                doc.shift_remove(key);
            }
        }
        (Some(existing), _) => {
            if node_equal(existing, fragment) {
                doc.shift_remove(key);
            }
        }
        (None, _) => {}
    }
    true
}
