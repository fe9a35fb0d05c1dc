//! Owned XML tree model
//!
//! Native project files are read into an owned tree of [`Element`]s with
//! `quick-xml`, edited in memory and written back with a configurable indent.
//! Text and comments are ordered children ([`Node::Text`], [`Node::Comment`])
//! so mixed content such as `<string>Hello <b>bold</b> world</string>`
//! survives a load/save cycle. Whitespace-only text is kept only inside
//! elements that also hold real text; elsewhere it is indentation and is
//! re-created by the writer.

use crate::errors::TreeError;
use indexmap::IndexMap;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use smallvec::SmallVec;
use std::borrow::Cow;

/// Attribute map of an element. Insertion order is the write order.
pub type Attributes = IndexMap<String, String>;

/// Position of an element below the document root, as child indices.
pub type NodePath = SmallVec<[usize; 8]>;

/// A child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    /// Tag name, `None` for text and comments
    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag.as_str())
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

/// A single XML element with its attributes and ordered children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Direct text children concatenated in document order
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// [`Element::text`] with surrounding whitespace removed
    pub fn text_trimmed(&self) -> String {
        self.text().trim().to_string()
    }

    /// Replace all direct text with a single leading text child
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|node| !matches!(node, Node::Text(_)));
        self.children.insert(0, Node::Text(text.into()));
    }

    fn has_text(&self) -> bool {
        self.children.iter().any(|node| matches!(node, Node::Text(_)))
    }

    /// Child elements, skipping text and comments
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Child elements with the given tag
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.tag == tag)
    }

    /// First child element with the given tag
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.elements().find(|el| el.tag == tag)
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Resolve a [`NodePath`] relative to this element
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &idx in path {
            current = current.children.get(idx)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &idx in path {
            current = current.children.get_mut(idx)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Parse a standalone fragment such as `<uses-permission android:name="X"/>`
    pub fn parse(xml: &str) -> Result<Element, TreeError> {
        XmlDocument::parse(xml).map(|doc| doc.root)
    }

    /// Serialize without declaration or indentation
    pub fn to_xml_string(&self) -> Result<String, TreeError> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

/// The `<?xml ...?>` declaration of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Declaration {
    fn from_event(decl: &BytesDecl<'_>) -> Result<Self, TreeError> {
        fn lossy(raw: Cow<'_, [u8]>) -> String {
            String::from_utf8_lossy(&raw).into_owned()
        }
        Ok(Declaration {
            version: lossy(decl.version()?),
            encoding: decl.encoding().transpose()?.map(lossy),
            standalone: decl.standalone().transpose()?.map(lossy),
        })
    }
}

/// A parsed XML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Written back only when the source had one
    pub declaration: Option<Declaration>,
    /// DOCTYPE content, without the `<!DOCTYPE` wrapper
    pub doctype: Option<String>,
    /// Comments that precede the root element
    pub prolog: Vec<String>,
    pub root: Element,
}

impl XmlDocument {
    pub fn parse(content: &str) -> Result<Self, TreeError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut declaration = None;
        let mut doctype = None;
        let mut prolog = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| TreeError::Parse {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;

            match event {
                Event::Start(ref start) => {
                    stack.push(element_from_start(start)?);
                }
                Event::Empty(ref start) => {
                    let element = element_from_start(start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let Some(mut element) = stack.pop() else {
                        return Err(TreeError::Parse {
                            position: reader.buffer_position(),
                            message: "unexpected closing tag".to_string(),
                        });
                    };
                    drop_indentation(&mut element);
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(ref text) => {
                    let value = text.unescape()?;
                    if let Some(top) = stack.last_mut() {
                        push_text(top, &value);
                    }
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    if let Some(top) = stack.last_mut() {
                        push_text(top, &String::from_utf8_lossy(&raw));
                    }
                }
                Event::Comment(ref comment) => {
                    let value = String::from_utf8_lossy(comment).into_owned();
                    match stack.last_mut() {
                        Some(top) => top.children.push(Node::Comment(value)),
                        None if root.is_none() => prolog.push(value),
                        None => {}
                    }
                }
                Event::DocType(ref dt) => {
                    doctype = Some(String::from_utf8_lossy(dt).trim().to_string());
                }
                Event::Decl(ref decl) => {
                    declaration = Some(Declaration::from_event(decl)?);
                }
                Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(TreeError::Parse {
                position: reader.buffer_position(),
                message: "unexpected end of document".to_string(),
            });
        }

        let root = root.ok_or(TreeError::MissingRoot)?;
        Ok(XmlDocument {
            declaration,
            doctype,
            prolog,
            root,
        })
    }

    /// Serialize with `indent` spaces per level. Elements holding text are
    /// written inline.
    pub fn to_string_indented(&self, indent: usize) -> Result<String, TreeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
        if let Some(decl) = &self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))?;
        }
        if let Some(doctype) = &self.doctype {
            writer.write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))?;
        }
        for comment in &self.prolog {
            writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?;
        }
        write_element(&mut writer, &self.root)?;
        let mut out = String::from_utf8(writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, TreeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Adjacent text events (text, entity, CDATA) join into one child
fn push_text(element: &mut Element, value: &str) {
    match element.children.last_mut() {
        Some(Node::Text(text)) => text.push_str(value),
        _ => element.children.push(Node::Text(value.to_string())),
    }
}

/// Without real text, whitespace children are only layout
fn drop_indentation(element: &mut Element) {
    let holds_text = element
        .children
        .iter()
        .any(|node| matches!(node, Node::Text(_)) && !node.is_blank_text());
    if !holds_text {
        element.children.retain(|node| !node.is_blank_text());
    }
}

fn write_children<W: std::io::Write>(writer: &mut Writer<W>, children: &[Node]) -> Result<(), TreeError> {
    for child in children {
        match child {
            Node::Element(el) => write_element(writer, el)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))))?,
            Node::Comment(comment) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(Cow::Borrowed(
                    comment.as_str(),
                ))))?;
            }
        }
    }
    Ok(())
}

pub(crate) fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> Result<(), TreeError> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if element.has_text() {
        // Content goes through as one pre-escaped text run so the outer
        // writer adds no line breaks inside it.
        let mut inline = Writer::new(Vec::new());
        write_children(&mut inline, &element.children)?;
        let content = String::from_utf8(inline.into_inner())?;
        writer.write_event(Event::Text(BytesText::from_escaped(content)))?;
    } else {
        write_children(writer, &element.children)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- generated -->
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example">
    <!-- sdk -->
    <uses-sdk android:minSdkVersion="10" android:maxSdkVersion="15"/>
    <application android:label="@string/app_name">
        <activity android:name="MainActivity">text &amp; more</activity>
    </application>
</manifest>
"#;

    #[test]
    fn test_parse_keeps_structure() -> Result<(), TreeError> {
        let doc = XmlDocument::parse(MANIFEST)?;
        assert_eq!(doc.root.tag, "manifest");
        assert_eq!(doc.prolog, vec![" generated ".to_string()]);
        assert_eq!(doc.root.children.len(), 3);
        assert!(matches!(doc.root.children[0], Node::Comment(_)));

        let activity = doc
            .root
            .find("application")
            .and_then(|app| app.find("activity"));
        assert!(activity.is_some_and(|a| a.text_trimmed() == "text & more"));
        Ok(())
    }

    #[test]
    fn test_round_trip_preserves_attributes_and_comments() -> Result<(), TreeError> {
        let doc = XmlDocument::parse(MANIFEST)?;
        let written = doc.to_string_indented(4)?;
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(written.contains("<!-- sdk -->"));
        assert!(written.contains("android:maxSdkVersion=\"15\""));

        let reparsed = XmlDocument::parse(&written)?;
        assert_eq!(reparsed.root, doc.root);
        Ok(())
    }

    const STRINGS: &str = r#"<resources>
    <string name="app_name">Example</string>
    <string name="greeting">Hello <b>bold</b> world</string>
    <string name="padded">  two  spaces  </string>
</resources>
"#;

    #[test]
    fn test_mixed_content_round_trip() -> Result<(), TreeError> {
        let doc = XmlDocument::parse(STRINGS)?;
        let greeting = doc.root.elements().nth(1);
        assert!(greeting.is_some_and(|g| g.children.len() == 3 && g.text() == "Hello  world"));

        let written = doc.to_string_indented(4)?;
        assert_eq!(written, STRINGS);
        Ok(())
    }

    #[test]
    fn test_graft_target_with_mixed_content_sibling() -> Result<(), TreeError> {
        let mut doc = XmlDocument::parse(STRINGS)?;
        doc.root.append(Element::new("string").with_attribute("name", "added"));
        let written = doc.to_string_indented(4)?;
        assert!(written.contains("<string name=\"greeting\">Hello <b>bold</b> world</string>\n"));
        assert!(written.contains("    <string name=\"added\"/>\n</resources>"));
        Ok(())
    }

    #[test]
    fn test_declaration_kept_only_when_present() -> Result<(), TreeError> {
        let written = XmlDocument::parse(STRINGS)?.to_string_indented(4)?;
        assert!(!written.contains("<?xml"));

        let doc = XmlDocument::parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><widget/>")?;
        assert!(doc
            .declaration
            .as_ref()
            .is_some_and(|d| d.encoding.as_deref() == Some("UTF-8") && d.standalone.as_deref() == Some("yes")));
        assert!(doc
            .to_string_indented(4)?
            .starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        Ok(())
    }

    #[test]
    fn test_fragment_compact_serialization() -> Result<(), TreeError> {
        let el = Element::parse("<uses-permission   android:name=\"X\" />")?;
        assert_eq!(el.to_xml_string()?, "<uses-permission android:name=\"X\"/>");
        Ok(())
    }

    #[test]
    fn test_unclosed_document_is_error() {
        let result = XmlDocument::parse("<manifest><application>");
        assert!(matches!(result, Err(TreeError::Parse { .. })));
    }

    #[test]
    fn test_element_at_path() -> Result<(), TreeError> {
        let doc = XmlDocument::parse(MANIFEST)?;
        let app = doc.root.element_at(&[2]);
        assert!(app.is_some_and(|a| a.tag == "application"));
        assert!(doc.root.element_at(&[0]).is_none());
        Ok(())
    }
}
